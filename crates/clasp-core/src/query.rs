//! Locator queries.
//!
//! A [`Locator`] describes which on-screen element to find. Locators render to
//! the query syntax an XCUITest-style driver understands (predicate strings,
//! tree paths, accessibility ids) and can also be evaluated locally against a
//! [`UIElement`], which lets any backend that can dump its tree search it
//! without server-side support.
//!
//! # Example
//!
//! ```
//! use clasp_core::query::contains_any_text;
//!
//! let locator = contains_any_text(r#"Say "hi""#);
//! assert!(locator.to_string().contains(r#"label CONTAINS "Say \"hi\"""#));
//! ```

use std::fmt;

use crate::element::{ElementKind, UIElement};

/// Kinds matched by the loose text predicate.
const LOOSE_TEXT_KINDS: [ElementKind; 4] = [
    ElementKind::StaticText,
    ElementKind::Button,
    ElementKind::Other,
    ElementKind::Cell,
];

/// A display attribute a text condition can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Name,
    Label,
    Value,
}

impl Attribute {
    fn key(&self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Label => "label",
            Attribute::Value => "value",
        }
    }

    fn read<'a>(&self, element: &'a UIElement) -> Option<&'a str> {
        match self {
            Attribute::Name => element.identifier.as_deref(),
            Attribute::Label => element.label.as_deref(),
            Attribute::Value => element.value.as_deref(),
        }
    }
}

/// How the text of an attribute is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Equals(String),
    Contains(String),
}

impl TextMatch {
    pub fn text(&self) -> &str {
        match self {
            TextMatch::Equals(t) | TextMatch::Contains(t) => t,
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        match self {
            TextMatch::Equals(t) => candidate == t,
            TextMatch::Contains(t) => candidate.contains(t.as_str()),
        }
    }
}

/// Escapes a raw string for embedding inside a double-quoted predicate literal.
///
/// Every `"` becomes `\"`. Backslashes are doubled first, so a `\` already
/// in the input cannot swallow the escape of the quote after it.
pub fn escape_predicate(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders a string as a tree-path (XPath 1.0) literal.
///
/// XPath has no escape character, so a literal containing `"` is quoted with
/// `'` instead, and one containing both is assembled with `concat()`.
pub fn xpath_literal(raw: &str) -> String {
    if !raw.contains('"') {
        return format!("\"{}\"", raw);
    }
    if !raw.contains('\'') {
        return format!("'{}'", raw);
    }
    let parts: Vec<String> = raw
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// A predicate over an element's kind and display text.
///
/// An empty `kinds` list matches every kind; a missing text condition matches
/// every element of the allowed kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub kinds: Vec<ElementKind>,
    pub text: Option<TextMatch>,
    pub attributes: Vec<Attribute>,
}

impl Predicate {
    /// A predicate restricted to the given kinds, with no text condition yet.
    pub fn kinds(kinds: &[ElementKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            text: None,
            attributes: vec![Attribute::Name, Attribute::Label],
        }
    }

    /// A predicate over a single kind.
    pub fn kind(kind: ElementKind) -> Self {
        Self::kinds(&[kind])
    }

    /// A predicate over every kind.
    pub fn any() -> Self {
        Self::kinds(&[])
    }

    /// Requires one of the attributes to equal `text`.
    pub fn equals(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Equals(text.into()));
        self
    }

    /// Requires one of the attributes to contain `text`.
    pub fn contains(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Contains(text.into()));
        self
    }

    /// Sets which attributes the text condition is checked against.
    pub fn on(mut self, attributes: &[Attribute]) -> Self {
        self.attributes = attributes.to_vec();
        self
    }

    /// Evaluates the predicate against a single node.
    pub fn matches(&self, element: &UIElement) -> bool {
        if !self.kinds.is_empty() {
            match element.kind() {
                Some(kind) if self.kinds.contains(&kind) => {}
                _ => return false,
            }
        }
        match &self.text {
            None => true,
            Some(cond) => self
                .attributes
                .iter()
                .filter_map(|attr| attr.read(element))
                .any(|candidate| cond.accepts(candidate)),
        }
    }

    /// Renders as an iOS predicate string.
    pub fn to_predicate_string(&self) -> String {
        let kinds = match self.kinds.len() {
            0 => None,
            1 => Some(format!("type == \"{}\"", self.kinds[0].type_name())),
            _ => Some(format!(
                "({})",
                self.kinds
                    .iter()
                    .map(|k| format!("type == \"{}\"", k.type_name()))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            )),
        };

        let text = self.text.as_ref().map(|cond| {
            let (op, text) = match cond {
                TextMatch::Equals(t) => ("==", t),
                TextMatch::Contains(t) => ("CONTAINS", t),
            };
            let safe = escape_predicate(text);
            let clauses = self
                .attributes
                .iter()
                .map(|attr| format!("{} {} \"{}\"", attr.key(), op, safe))
                .collect::<Vec<_>>()
                .join(" OR ");
            format!("({})", clauses)
        });

        match (kinds, text) {
            (Some(k), Some(t)) => format!("{} AND {}", k, t),
            (Some(k), None) => k,
            (None, Some(t)) => t,
            (None, None) => "TRUEPREDICATE".to_string(),
        }
    }

    /// Renders as a tree-path step, e.g. `//XCUIElementTypeStaticText[@name="x" or @label="x"]`.
    fn to_xpath_step(&self) -> String {
        let node = match self.kinds.as_slice() {
            [single] => single.type_name(),
            _ => "*".to_string(),
        };
        let mut conditions = Vec::new();
        if self.kinds.len() > 1 {
            conditions.push(self.xpath_kind_test());
        }
        if let Some(clauses) = self.xpath_text_test() {
            if conditions.is_empty() {
                conditions.push(clauses);
            } else {
                conditions.push(format!("({})", clauses));
            }
        }
        if conditions.is_empty() {
            format!("//{}", node)
        } else {
            format!("//{}[{}]", node, conditions.join(" and "))
        }
    }

    /// Renders as a boolean test on the context node, for use inside `[...]`.
    fn to_xpath_test(&self) -> String {
        let mut conditions = Vec::new();
        if !self.kinds.is_empty() {
            conditions.push(self.xpath_kind_test());
        }
        if let Some(clauses) = self.xpath_text_test() {
            conditions.push(format!("({})", clauses));
        }
        if conditions.is_empty() {
            "true()".to_string()
        } else {
            conditions.join(" and ")
        }
    }

    fn xpath_kind_test(&self) -> String {
        let tests: Vec<String> = self
            .kinds
            .iter()
            .map(|k| format!("self::{}", k.type_name()))
            .collect();
        match tests.as_slice() {
            [single] => single.clone(),
            _ => format!("({})", tests.join(" or ")),
        }
    }

    fn xpath_text_test(&self) -> Option<String> {
        let cond = self.text.as_ref()?;
        let literal = xpath_literal(cond.text());
        let clauses = self
            .attributes
            .iter()
            .map(|attr| match cond {
                TextMatch::Equals(_) => format!("@{}={}", attr.key(), literal),
                TextMatch::Contains(_) => format!("contains(@{},{})", attr.key(), literal),
            })
            .collect::<Vec<_>>()
            .join(" or ");
        Some(clauses)
    }
}

/// Describes which on-screen element to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// The element whose accessibility identifier equals the given value.
    AccessibilityId(String),
    /// The first element matching a predicate.
    Predicate(Predicate),
    /// The nearest ancestor of `kind` of the first node matching `of`.
    Ancestor { of: Predicate, kind: ElementKind },
    /// The first direct child of `kind` of the nearest `container` around a
    /// node matching `anchor`, excluding anything that itself matches
    /// `anchor`. Finds an unlabelled control next to a labelled header.
    Sibling {
        anchor: Predicate,
        container: ElementKind,
        kind: ElementKind,
    },
    /// Every element of one kind, in tree order.
    Kind(ElementKind),
}

impl Locator {
    pub fn id(identifier: impl Into<String>) -> Self {
        Locator::AccessibilityId(identifier.into())
    }

    pub fn ancestor(of: Predicate, kind: ElementKind) -> Self {
        Locator::Ancestor { of, kind }
    }

    pub fn sibling(anchor: Predicate, container: ElementKind, kind: ElementKind) -> Self {
        Locator::Sibling {
            anchor,
            container,
            kind,
        }
    }

    /// Renders the selector string a WebDriver-style backend accepts.
    pub fn selector(&self) -> String {
        match self {
            Locator::AccessibilityId(id) => format!("~{}", id),
            Locator::Predicate(p) => format!("-ios predicate string:{}", p.to_predicate_string()),
            Locator::Ancestor { of, kind } => {
                format!("{}/ancestor::{}[1]", of.to_xpath_step(), kind.type_name())
            }
            Locator::Sibling {
                anchor,
                container,
                kind,
            } => format!(
                "{}/ancestor::{}[1]/{}[not({})][1]",
                anchor.to_xpath_step(),
                container.type_name(),
                kind.type_name(),
                anchor.to_xpath_test()
            ),
            Locator::Kind(kind) => format!("//{}", kind.type_name()),
        }
    }

    /// Evaluates the node-local part of this locator.
    ///
    /// For [`Locator::Ancestor`] this is the inner predicate, and for
    /// [`Locator::Sibling`] the kind and anchor exclusion; the structural part
    /// needs the tree and is done by [`locate`](crate::driver::locate).
    pub fn matches(&self, element: &UIElement) -> bool {
        match self {
            Locator::AccessibilityId(id) => element.identifier.as_deref() == Some(id.as_str()),
            Locator::Predicate(p) => p.matches(element),
            Locator::Ancestor { of, .. } => of.matches(element),
            Locator::Sibling { anchor, kind, .. } => {
                element.kind() == Some(*kind) && !anchor.matches(element)
            }
            Locator::Kind(kind) => element.kind() == Some(*kind),
        }
    }
}

impl From<Predicate> for Locator {
    fn from(p: Predicate) -> Self {
        Locator::Predicate(p)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// Any static text, button, container, or cell whose name, label, or value
/// contains `text`.
pub fn contains_any_text(text: &str) -> Locator {
    Predicate::kinds(&LOOSE_TEXT_KINDS)
        .contains(text)
        .on(&[Attribute::Name, Attribute::Label, Attribute::Value])
        .into()
}

/// An element of `kind` whose label or name equals `text`.
pub fn exact_text(kind: ElementKind, text: &str) -> Predicate {
    Predicate::kind(kind)
        .equals(text)
        .on(&[Attribute::Label, Attribute::Name])
}

/// An element of `kind` whose name or label contains `text`.
pub fn contains_text(kind: ElementKind, text: &str) -> Predicate {
    Predicate::kind(kind)
        .contains(text)
        .on(&[Attribute::Name, Attribute::Label])
}
