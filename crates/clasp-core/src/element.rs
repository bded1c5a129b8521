//! UI element types for accessibility-tree automation.
//!
//! This module defines the data structures representing nodes of the
//! accessibility hierarchy reported by a driver, the [`ElementKind`]s the
//! locator layer filters on, and the transient [`ElementHandle`] produced each
//! time a locator is resolved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::Locator;

/// Prefix used by XCUITest for element type names.
const XCUI_PREFIX: &str = "XCUIElementType";

/// The element kinds the locator layer knows how to filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    StaticText,
    Button,
    Cell,
    Switch,
    TextView,
    TextField,
    SecureTextField,
    Keyboard,
    /// Generic container (`XCUIElementTypeOther`).
    Other,
}

impl ElementKind {
    /// Short name, e.g. `"StaticText"`.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::StaticText => "StaticText",
            ElementKind::Button => "Button",
            ElementKind::Cell => "Cell",
            ElementKind::Switch => "Switch",
            ElementKind::TextView => "TextView",
            ElementKind::TextField => "TextField",
            ElementKind::SecureTextField => "SecureTextField",
            ElementKind::Keyboard => "Keyboard",
            ElementKind::Other => "Other",
        }
    }

    /// Fully-qualified type name as used in queries, e.g. `"XCUIElementTypeStaticText"`.
    pub fn type_name(&self) -> String {
        format!("{}{}", XCUI_PREFIX, self.name())
    }

    /// Parses either the short or the fully-qualified spelling.
    ///
    /// Returns `None` for element types the locator layer does not model.
    pub fn parse(raw: &str) -> Option<Self> {
        let short = raw.strip_prefix(XCUI_PREFIX).unwrap_or(raw);
        let kind = match short {
            "StaticText" => ElementKind::StaticText,
            "Button" => ElementKind::Button,
            "Cell" => ElementKind::Cell,
            "Switch" => ElementKind::Switch,
            "TextView" => ElementKind::TextView,
            "TextField" => ElementKind::TextField,
            "SecureTextField" => ElementKind::SecureTextField,
            "Keyboard" => ElementKind::Keyboard,
            "Other" => ElementKind::Other,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents a UI element from the accessibility hierarchy.
///
/// Elements form a tree via the `children` field. Every attribute is optional
/// because backends differ in what they report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// Backend reference usable for low-level gestures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    /// The accessibility identifier / name.
    #[serde(rename = "name", alias = "AXUniqueId", default)]
    pub identifier: Option<String>,

    /// The accessibility label, typically the user-visible text.
    #[serde(alias = "AXLabel", default)]
    pub label: Option<String>,

    /// The current value, e.g. text field contents or a switch state.
    #[serde(alias = "AXValue", default)]
    pub value: Option<String>,

    /// The element type (e.g. "Button" or "XCUIElementTypeButton").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The element's frame in screen points.
    #[serde(default)]
    pub frame: Option<ElementFrame>,

    /// Child elements nested within this element.
    #[serde(default)]
    pub children: Vec<UIElement>,

    /// Whether the element is enabled. Absent means enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Whether the element is on screen. Absent means visible.
    #[serde(default)]
    pub visible: Option<bool>,
}

impl UIElement {
    /// Returns the modelled kind of this element, if any.
    pub fn kind(&self) -> Option<ElementKind> {
        self.element_type.as_deref().and_then(ElementKind::parse)
    }

    /// Whether this element would be reported as displayed.
    ///
    /// An element is displayed unless it is explicitly invisible or its
    /// frame has no area.
    pub fn is_displayed(&self) -> bool {
        if self.visible == Some(false) {
            return false;
        }
        match &self.frame {
            Some(frame) => frame.width > 0.0 && frame.height > 0.0,
            None => true,
        }
    }

    /// Whether this element would be reported as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// A copy of this element's own attributes, without its subtree.
    pub fn detached(&self) -> UIElement {
        UIElement {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, origin at the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A reference to a currently-resolved UI node.
///
/// A handle is only valid until the next UI mutation. It is never cached
/// across actions: every interaction resolves a fresh one.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    /// Opaque backend id for gestures. `None` when the backend could not
    /// provide one.
    pub element_id: Option<String>,
    /// The locator this handle was resolved from.
    pub locator: Locator,
    /// The node's attributes at resolution time (children stripped).
    pub element: UIElement,
}

impl ElementHandle {
    pub fn new(locator: Locator, element: &UIElement) -> Self {
        Self {
            element_id: element.element_id.clone(),
            locator,
            element: element.detached(),
        }
    }

    /// Best human-readable description of the node, for logs.
    pub fn describe(&self) -> String {
        let kind = self
            .element
            .element_type
            .as_deref()
            .unwrap_or("element");
        match (&self.element.label, &self.element.identifier) {
            (Some(label), _) => format!("{} '{}'", kind, label),
            (None, Some(id)) => format!("{} #{}", kind, id),
            (None, None) => kind.to_string(),
        }
    }
}
