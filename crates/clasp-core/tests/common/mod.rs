//! Shared test helpers for clasp-core integration tests.
//!
//! This module provides a scriptable [`MockDriver`] that serves a sequence of
//! screens (advancing on each scroll gesture), records every query and action
//! it receives, and can be told to hide specific selectors to simulate query
//! engines that disagree about what is on screen.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clasp_core::config::{ClaspConfig, SettleMode};
use clasp_core::driver::{locate, locate_all, DriverError, Gesture, UiDriver};
use clasp_core::element::{ElementHandle, UIElement};
use clasp_core::interact::Interactor;
use clasp_core::query::Locator;
use clasp_core::snapshot::{assign_element_ids, find_by_element_id};

// ---------------------------------------------------------------------------
// Tree builders
// ---------------------------------------------------------------------------

pub fn node(kind: &str, label: &str, children: Vec<UIElement>) -> UIElement {
    UIElement {
        label: Some(label.to_string()),
        element_type: Some(kind.to_string()),
        children,
        ..Default::default()
    }
}

pub fn text(label: &str) -> UIElement {
    node("StaticText", label, vec![])
}

pub fn button(label: &str, children: Vec<UIElement>) -> UIElement {
    node("Button", label, children)
}

pub fn cell(label: &str, children: Vec<UIElement>) -> UIElement {
    node("Cell", label, children)
}

/// An element found by accessibility identifier.
pub fn with_identifier(kind: &str, identifier: &str) -> UIElement {
    UIElement {
        identifier: Some(identifier.to_string()),
        element_type: Some(kind.to_string()),
        ..Default::default()
    }
}

pub fn hidden(mut element: UIElement) -> UIElement {
    element.visible = Some(false);
    element
}

/// Wraps elements in a single root container.
pub fn screen(children: Vec<UIElement>) -> Vec<UIElement> {
    vec![node("Other", "root", children)]
}

// ---------------------------------------------------------------------------
// Mock driver
// ---------------------------------------------------------------------------

/// Everything the mock was asked to do.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    /// Selector of every `find_element` call, in order.
    pub finds: Vec<String>,
    /// Selector of every `list_elements` call.
    pub lists: Vec<String>,
    /// Element ids clicked.
    pub clicks: Vec<String>,
    /// `(element id, text)` for every value set.
    pub values: Vec<(String, String)>,
    pub gestures: Vec<Gesture>,
    pub dumps: usize,
    pub releases: usize,
}

impl Calls {
    pub fn finds_of(&self, selector: &str) -> usize {
        self.finds.iter().filter(|s| s.as_str() == selector).count()
    }

    pub fn scrolls(&self) -> usize {
        self.gestures
            .iter()
            .filter(|g| matches!(g, Gesture::Scroll { .. }))
            .count()
    }
}

pub struct MockDriver {
    screens: Vec<Vec<UIElement>>,
    current: Mutex<usize>,
    hidden_selectors: Mutex<HashSet<String>>,
    calls: Mutex<Calls>,
    scroll_fails: bool,
    screenshot: Option<Vec<u8>>,
}

impl MockDriver {
    /// A driver showing one fixed screen.
    pub fn new(tree: Vec<UIElement>) -> Self {
        Self::with_screens(vec![tree])
    }

    /// A driver that moves to the next screen on every scroll gesture and
    /// stays on the last one.
    pub fn with_screens(mut screens: Vec<Vec<UIElement>>) -> Self {
        for tree in &mut screens {
            assign_element_ids(tree);
        }
        Self {
            screens,
            current: Mutex::new(0),
            hidden_selectors: Mutex::new(HashSet::new()),
            calls: Mutex::new(Calls::default()),
            scroll_fails: false,
            screenshot: None,
        }
    }

    pub fn failing_scrolls(mut self) -> Self {
        self.scroll_fails = true;
        self
    }

    pub fn with_screenshot(mut self, png: &[u8]) -> Self {
        self.screenshot = Some(png.to_vec());
        self
    }

    /// Makes `find_element` report nothing for this locator.
    pub fn hide(&self, locator: &Locator) {
        self.hidden_selectors.lock().unwrap().insert(locator.selector());
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    fn tree(&self) -> Vec<UIElement> {
        let index = *self.current.lock().unwrap();
        self.screens.get(index).cloned().unwrap_or_default()
    }

    fn node_for(&self, handle: &ElementHandle) -> Result<UIElement, DriverError> {
        let tree = self.tree();
        handle
            .element_id
            .as_deref()
            .and_then(|id| find_by_element_id(&tree, id))
            .cloned()
            .ok_or_else(|| DriverError::StaleElement(handle.describe()))
    }

    fn handle_id(handle: &ElementHandle) -> String {
        handle.element_id.clone().unwrap_or_default()
    }
}

#[async_trait]
impl UiDriver for MockDriver {
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        self.calls.lock().unwrap().dumps += 1;
        Ok(self.tree())
    }

    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementHandle>, DriverError> {
        let selector = locator.selector();
        self.calls.lock().unwrap().finds.push(selector.clone());
        if self.hidden_selectors.lock().unwrap().contains(&selector) {
            return Ok(None);
        }
        Ok(locate(&self.tree(), locator))
    }

    async fn list_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        self.calls.lock().unwrap().lists.push(locator.selector());
        Ok(locate_all(&self.tree(), locator))
    }

    async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.node_for(handle)?.is_displayed())
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.node_for(handle)?.is_enabled())
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        self.node_for(handle)?;
        self.calls.lock().unwrap().clicks.push(Self::handle_id(handle));
        Ok(())
    }

    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.node_for(handle)?;
        self.calls
            .lock()
            .unwrap()
            .values
            .push((Self::handle_id(handle), text.to_string()));
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &Gesture) -> Result<(), DriverError> {
        self.calls.lock().unwrap().gestures.push(gesture.clone());
        if let Gesture::Scroll { .. } = gesture {
            if self.scroll_fails {
                return Err(DriverError::CommandFailed("scroll rejected".to_string()));
            }
            let mut current = self.current.lock().unwrap();
            if *current + 1 < self.screens.len() {
                *current += 1;
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.screenshot
            .clone()
            .ok_or_else(|| DriverError::CommandFailed("no screenshot".to_string()))
    }

    async fn release(&self) -> Result<(), DriverError> {
        self.calls.lock().unwrap().releases += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interactor construction
// ---------------------------------------------------------------------------

/// Fixed settle pauses keep call counts independent of tree polling.
pub fn test_config() -> ClaspConfig {
    let mut config = ClaspConfig::default();
    config.settle.mode = SettleMode::Fixed;
    config
}

pub fn interactor(driver: &Arc<MockDriver>) -> Interactor {
    Interactor::new(driver.clone(), test_config())
}

/// Generate a unique session name for test isolation.
pub fn unique_session_name() -> String {
    format!("test_{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}
