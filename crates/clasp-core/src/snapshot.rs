//! In-memory [`UiDriver`] over a captured accessibility tree.
//!
//! [`SnapshotDriver`] answers queries against a fixed element tree (for
//! example a page-source dump taken when a scenario failed) and records the
//! actions the interactor would have issued instead of performing them. This
//! makes it possible to replay a fallback chain offline and see which
//! strategy resolves.
//!
//! # Example
//!
//! ```
//! use clasp_core::snapshot::SnapshotDriver;
//!
//! let driver = SnapshotDriver::from_json(
//!     r#"[{"type": "StaticText", "label": "Create"}]"#,
//! ).unwrap();
//! assert_eq!(driver.tree()[0].element_id.as_deref(), Some("e0"));
//! ```

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::driver::{locate, DriverError, Gesture, UiDriver};
use crate::element::{ElementHandle, UIElement};

/// An action the snapshot driver was asked to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformedAction {
    Click { element_id: Option<String>, element: String },
    SetValue { element_id: Option<String>, element: String, text: String },
    Gesture(Gesture),
}

/// Assigns path-based ids (`e0`, `e0.1`, ...) to every node lacking one.
pub fn assign_element_ids(elements: &mut [UIElement]) {
    assign_with_prefix(elements, "e");
}

fn assign_with_prefix(elements: &mut [UIElement], prefix: &str) {
    for (i, element) in elements.iter_mut().enumerate() {
        let id = if prefix == "e" {
            format!("e{}", i)
        } else {
            format!("{}.{}", prefix, i)
        };
        if element.element_id.is_none() {
            element.element_id = Some(id.clone());
        }
        assign_with_prefix(&mut element.children, &id);
    }
}

/// Finds a node by its element id.
pub fn find_by_element_id<'a>(elements: &'a [UIElement], element_id: &str) -> Option<&'a UIElement> {
    for element in elements {
        if element.element_id.as_deref() == Some(element_id) {
            return Some(element);
        }
        if let Some(found) = find_by_element_id(&element.children, element_id) {
            return Some(found);
        }
    }
    None
}

/// A driver answering from a fixed tree.
pub struct SnapshotDriver {
    tree: Vec<UIElement>,
    performed: Mutex<Vec<PerformedAction>>,
}

impl SnapshotDriver {
    pub fn new(mut tree: Vec<UIElement>) -> Self {
        assign_element_ids(&mut tree);
        Self {
            tree,
            performed: Mutex::new(Vec::new()),
        }
    }

    /// Parses a snapshot from JSON: either an array of root elements or a
    /// single root object.
    pub fn from_json(json: &str) -> Result<Self, DriverError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| DriverError::JsonParse(e.to_string()))?;
        let tree = if value.is_array() {
            serde_json::from_value::<Vec<UIElement>>(value)
        } else {
            serde_json::from_value::<UIElement>(value).map(|root| vec![root])
        }
        .map_err(|e| DriverError::JsonParse(e.to_string()))?;
        Ok(Self::new(tree))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn tree(&self) -> &[UIElement] {
        &self.tree
    }

    /// Actions recorded so far, in order.
    pub async fn performed(&self) -> Vec<PerformedAction> {
        self.performed.lock().await.clone()
    }

    /// Re-resolves a handle against the tree.
    fn node_for(&self, handle: &ElementHandle) -> Result<&UIElement, DriverError> {
        let found = match &handle.element_id {
            Some(id) => find_by_element_id(&self.tree, id),
            None => locate(&self.tree, &handle.locator)
                .and_then(|h| h.element_id)
                .and_then(|id| find_by_element_id(&self.tree, &id)),
        };
        found.ok_or_else(|| DriverError::StaleElement(handle.describe()))
    }
}

#[async_trait]
impl UiDriver for SnapshotDriver {
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        Ok(self.tree.clone())
    }

    async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.node_for(handle)?.is_displayed())
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.node_for(handle)?.is_enabled())
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        self.node_for(handle)?;
        self.performed.lock().await.push(PerformedAction::Click {
            element_id: handle.element_id.clone(),
            element: handle.describe(),
        });
        Ok(())
    }

    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.node_for(handle)?;
        self.performed.lock().await.push(PerformedAction::SetValue {
            element_id: handle.element_id.clone(),
            element: handle.describe(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &Gesture) -> Result<(), DriverError> {
        self.performed
            .lock()
            .await
            .push(PerformedAction::Gesture(gesture.clone()));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::CommandFailed(
            "snapshot driver has no screenshot".to_string(),
        ))
    }
}
