//! UI driver trait for backend-agnostic element queries and actions.
//!
//! This module defines the [`UiDriver`] trait, the capability the locator
//! layer consumes from an automation backend: dumping the accessibility tree,
//! querying elements, checking display/enabled state, clicking, setting
//! values, and performing gestures. The wire protocol behind it is the
//! backend's business.
//!
//! Element search has default implementations that fetch the full hierarchy
//! via [`dump_tree`](UiDriver::dump_tree) and search it locally with
//! [`locate`] / [`locate_all`]. Backends with server-side search can override
//! them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::element::{ElementHandle, ElementKind, UIElement};
use crate::query::{Locator, Predicate};

/// Poll interval used when a caller does not configure one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can occur during driver operations.
///
/// This enum unifies errors from all backends behind a single type.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The backend is not available or not connected.
    #[error("Not connected to automation backend")]
    NotConnected,

    /// The connection to the backend was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// The element a handle refers to is no longer in the tree.
    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

/// Direction for a scroll gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }
}

/// Platform-level gestures addressed by element id rather than by a
/// high-level click.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    DoubleTap { element_id: String },
    TouchAndHold { element_id: String, duration: Duration },
    Scroll { direction: ScrollDirection },
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::DoubleTap { .. } => "double_tap",
            Gesture::TouchAndHold { .. } => "touch_and_hold",
            Gesture::Scroll { .. } => "scroll",
        }
    }
}

/// Finds the first element matching `locator` in tree order.
///
/// For [`Locator::Ancestor`], walks matching nodes in tree order and returns
/// the nearest ancestor of the requested kind of the first one that has one.
/// For [`Locator::Sibling`], does the same for the container and then takes
/// its first direct child of the requested kind that is not an anchor.
pub fn locate(tree: &[UIElement], locator: &Locator) -> Option<ElementHandle> {
    let found = match locator {
        Locator::Ancestor { of, kind } => {
            let mut stack = Vec::new();
            find_ancestor(tree, &mut stack, &|el: &UIElement| of.matches(el), *kind)
        }
        Locator::Sibling {
            anchor,
            container,
            kind,
        } => find_sibling(tree, &mut Vec::new(), anchor, *container, *kind),
        _ => find_first(tree, locator),
    };
    found.map(|el| ElementHandle::new(locator.clone(), el))
}

/// Finds every element matching `locator`, in tree order.
pub fn locate_all(tree: &[UIElement], locator: &Locator) -> Vec<ElementHandle> {
    match locator {
        Locator::Ancestor { .. } | Locator::Sibling { .. } => locate(tree, locator).into_iter().collect(),
        _ => {
            let mut found = Vec::new();
            collect_matching(tree, locator, &mut found);
            found
                .into_iter()
                .map(|el| ElementHandle::new(locator.clone(), el))
                .collect()
        }
    }
}

/// Finds the nearest ancestor of `kind` of the exact node `handle` was
/// resolved to.
///
/// The node is identified by its element id, or by its attributes when the
/// handle has none. Only that node's ancestry is considered, never another
/// node matching the same query.
pub fn locate_ancestor_of(tree: &[UIElement], handle: &ElementHandle, kind: ElementKind) -> Option<ElementHandle> {
    let is_target = |el: &UIElement| match &handle.element_id {
        Some(id) => el.element_id.as_deref() == Some(id.as_str()),
        None => el.detached() == handle.element,
    };
    let mut stack = Vec::new();
    if !path_to(tree, &mut stack, &is_target) {
        return None;
    }
    let ancestor = stack.iter().rev().copied().find(|a| a.kind() == Some(kind))?;
    let locator = match &handle.locator {
        Locator::Predicate(p) => Locator::ancestor(p.clone(), kind),
        _ => Locator::Kind(kind),
    };
    Some(ElementHandle::new(locator, ancestor))
}

/// Leaves the ancestors of the first node satisfying `is_target` on `stack`.
fn path_to<'a>(
    elements: &'a [UIElement],
    stack: &mut Vec<&'a UIElement>,
    is_target: &dyn Fn(&UIElement) -> bool,
) -> bool {
    for element in elements {
        if is_target(element) {
            return true;
        }
        stack.push(element);
        if path_to(&element.children, stack, is_target) {
            return true;
        }
        stack.pop();
    }
    false
}

fn find_first<'a>(elements: &'a [UIElement], locator: &Locator) -> Option<&'a UIElement> {
    for element in elements {
        if locator.matches(element) {
            return Some(element);
        }
        if let Some(found) = find_first(&element.children, locator) {
            return Some(found);
        }
    }
    None
}

fn collect_matching<'a>(elements: &'a [UIElement], locator: &Locator, out: &mut Vec<&'a UIElement>) {
    for element in elements {
        if locator.matches(element) {
            out.push(element);
        }
        collect_matching(&element.children, locator, out);
    }
}

fn find_ancestor<'a>(
    elements: &'a [UIElement],
    stack: &mut Vec<&'a UIElement>,
    matches: &dyn Fn(&UIElement) -> bool,
    kind: ElementKind,
) -> Option<&'a UIElement> {
    for element in elements {
        if matches(element) {
            if let Some(ancestor) = stack.iter().rev().copied().find(|a| a.kind() == Some(kind)) {
                return Some(ancestor);
            }
        }
        stack.push(element);
        let found = find_ancestor(&element.children, stack, matches, kind);
        stack.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

fn find_sibling<'a>(
    elements: &'a [UIElement],
    stack: &mut Vec<&'a UIElement>,
    anchor: &Predicate,
    container: ElementKind,
    kind: ElementKind,
) -> Option<&'a UIElement> {
    for element in elements {
        if anchor.matches(element) {
            let sibling = stack
                .iter()
                .rev()
                .copied()
                .find(|a| a.kind() == Some(container))
                .and_then(|c| {
                    c.children
                        .iter()
                        .find(|child| child.kind() == Some(kind) && !anchor.matches(child))
                });
            if sibling.is_some() {
                return sibling;
            }
        }
        stack.push(element);
        let found = find_sibling(&element.children, stack, anchor, container, kind);
        stack.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Flattens a hierarchy into every element that has an identifier or label.
pub fn flatten_elements(elements: &[UIElement]) -> Vec<UIElement> {
    let mut result = Vec::new();
    collect_labelled(elements, &mut result);
    result
}

fn collect_labelled(elements: &[UIElement], result: &mut Vec<UIElement>) {
    for element in elements {
        if element.identifier.is_some() || element.label.is_some() {
            result.push(element.detached());
        }
        collect_labelled(&element.children, result);
    }
}

/// Backend-agnostic UI automation capability.
///
/// # Required Methods
///
/// Implementors must provide [`dump_tree`](UiDriver::dump_tree),
/// [`is_displayed`](UiDriver::is_displayed), [`is_enabled`](UiDriver::is_enabled),
/// [`click`](UiDriver::click), [`set_value`](UiDriver::set_value),
/// [`perform_gesture`](UiDriver::perform_gesture) and
/// [`screenshot`](UiDriver::screenshot).
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Get the full UI element hierarchy for the current screen.
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError>;

    /// Find the first element matching a locator.
    ///
    /// Returns `Ok(None)` when nothing matches.
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementHandle>, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(locate(&tree, locator))
    }

    /// Find every element matching a locator, in tree order.
    async fn list_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(locate_all(&tree, locator))
    }

    /// Non-throwing existence probe.
    ///
    /// Any driver error is treated as "not present".
    async fn probe(&self, locator: &Locator) -> Option<ElementHandle> {
        match self.find_element(locator).await {
            Ok(found) => found,
            Err(e) => {
                debug!(locator = %locator, error = %e, "existence probe failed, treating as absent");
                None
            }
        }
    }

    /// Find the nearest ancestor of `kind` of the node behind `handle`.
    ///
    /// Returns `Ok(None)` when the node is gone or has no such ancestor.
    async fn find_ancestor(
        &self,
        handle: &ElementHandle,
        kind: ElementKind,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(locate_ancestor_of(&tree, handle, kind))
    }

    /// Whether the element behind a handle is currently displayed.
    async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    /// Whether the element behind a handle is currently enabled.
    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    /// Poll every `poll_interval` until the element is displayed or `timeout`
    /// elapses.
    ///
    /// Returns `Ok(false)` on timeout. Poll errors count as "not yet".
    async fn wait_until_displayed(
        &self,
        handle: &ElementHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, DriverError> {
        let start = Instant::now();
        loop {
            if let Ok(true) = self.is_displayed(handle).await {
                return Ok(true);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Poll every `poll_interval` until the element is enabled or `timeout`
    /// elapses.
    ///
    /// Returns `Ok(false)` on timeout. Poll errors count as "not yet".
    async fn wait_until_enabled(
        &self,
        handle: &ElementHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, DriverError> {
        let start = Instant::now();
        loop {
            if let Ok(true) = self.is_enabled(handle).await {
                return Ok(true);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// High-level click on the element.
    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    /// Replace the element's value with `text`.
    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Perform a platform-level gesture.
    async fn perform_gesture(&self, gesture: &Gesture) -> Result<(), DriverError>;

    /// Capture a screenshot of the current screen as raw PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// End the automation session.
    ///
    /// The default implementation does nothing.
    async fn release(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{contains_text, exact_text, Attribute};

    fn el(kind: &str, label: Option<&str>, children: Vec<UIElement>) -> UIElement {
        UIElement {
            label: label.map(str::to_string),
            element_type: Some(kind.to_string()),
            children,
            ..Default::default()
        }
    }

    fn settings_tree() -> Vec<UIElement> {
        vec![el(
            "Other",
            None,
            vec![
                el("Cell", Some("row-1"), vec![el("StaticText", Some("Cozy"), vec![])]),
                el(
                    "Cell",
                    Some("row-2"),
                    vec![el("Button", Some("btn"), vec![el("StaticText", Some("Compact"), vec![])])],
                ),
            ],
        )]
    }

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::CommandFailed("tap failed".to_string());
        assert!(err.to_string().contains("tap failed"));

        let err = DriverError::NotConnected;
        assert!(err.to_string().contains("Not connected"));

        let err = DriverError::StaleElement("e0.1".to_string());
        assert!(err.to_string().contains("e0.1"));

        let err = DriverError::Timeout;
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_locate_ancestor_picks_nearest_of_kind() {
        let tree = settings_tree();

        let cell = locate(
            &tree,
            &Locator::ancestor(exact_text(ElementKind::StaticText, "Cozy"), ElementKind::Cell),
        )
        .unwrap();
        assert_eq!(cell.element.label.as_deref(), Some("row-1"));

        let button = locate(
            &tree,
            &Locator::ancestor(exact_text(ElementKind::StaticText, "Compact"), ElementKind::Button),
        )
        .unwrap();
        assert_eq!(button.element.label.as_deref(), Some("btn"));

        // Cozy has a cell ancestor but no button ancestor.
        assert!(locate(
            &tree,
            &Locator::ancestor(exact_text(ElementKind::StaticText, "Cozy"), ElementKind::Button),
        )
        .is_none());
    }

    #[test]
    fn test_locate_ancestor_skips_matches_without_one() {
        let tree = vec![
            el("StaticText", Some("Room A"), vec![]),
            el("Cell", Some("cell"), vec![el("StaticText", Some("Room A"), vec![])]),
        ];
        let found = locate(
            &tree,
            &Locator::ancestor(contains_text(ElementKind::StaticText, "Room"), ElementKind::Cell),
        )
        .unwrap();
        assert_eq!(found.element.label.as_deref(), Some("cell"));
    }

    #[test]
    fn test_locate_all_in_tree_order() {
        let tree = vec![el(
            "Other",
            None,
            vec![
                el("TextView", Some("first"), vec![]),
                el("Cell", None, vec![el("TextView", Some("second"), vec![])]),
            ],
        )];
        let all = locate_all(&tree, &Locator::Kind(ElementKind::TextView));
        let labels: Vec<_> = all.iter().map(|h| h.element.label.clone().unwrap()).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn test_locate_by_id() {
        let mut send = el("Button", Some("Send"), vec![]);
        send.identifier = Some("sendMessageButton".to_string());
        let tree = vec![el("Other", None, vec![send])];
        assert!(locate(&tree, &Locator::id("sendMessageButton")).is_some());
        assert!(locate(&tree, &Locator::id("backButton")).is_none());
    }

    #[test]
    fn test_ancestor_of_handle_ignores_other_matches() {
        let mut tree = vec![el(
            "Other",
            None,
            vec![
                el("Other", Some("menu"), vec![el("StaticText", Some("Pin"), vec![])]),
                el("Cell", Some("chat-row"), vec![el("StaticText", Some("Pinned messages"), vec![])]),
            ],
        )];
        crate::snapshot::assign_element_ids(&mut tree);

        let pin = locate(&tree, &contains_text(ElementKind::StaticText, "Pin").into()).unwrap();
        assert_eq!(pin.element_id.as_deref(), Some("e0.0.0"));
        assert!(locate_ancestor_of(&tree, &pin, ElementKind::Cell).is_none());

        let pinned = locate(&tree, &exact_text(ElementKind::StaticText, "Pinned messages").into()).unwrap();
        let row = locate_ancestor_of(&tree, &pinned, ElementKind::Cell).unwrap();
        assert_eq!(row.element_id.as_deref(), Some("e0.1"));
    }

    #[test]
    fn test_ancestor_of_handle_without_id_matches_attributes() {
        let tree = settings_tree();
        let handle = ElementHandle::new(
            exact_text(ElementKind::StaticText, "Compact").into(),
            &el("StaticText", Some("Compact"), vec![]),
        );
        let button = locate_ancestor_of(&tree, &handle, ElementKind::Button).unwrap();
        assert_eq!(button.element.label.as_deref(), Some("btn"));
        assert!(matches!(button.locator, Locator::Ancestor { kind: ElementKind::Button, .. }));
    }

    #[test]
    fn test_locate_sibling_skips_anchor() {
        let mut header = el("Button", None, vec![]);
        header.identifier = Some("Rooms section header".to_string());
        let tree = vec![el(
            "Other",
            Some("rooms"),
            vec![
                header,
                el("StaticText", Some("Rooms"), vec![]),
                el("Button", Some("Add"), vec![]),
            ],
        )];
        let anchor = Predicate::kind(ElementKind::Button)
            .equals("Rooms section header")
            .on(&[Attribute::Name]);

        let plus = locate(&tree, &Locator::sibling(anchor.clone(), ElementKind::Other, ElementKind::Button)).unwrap();
        assert_eq!(plus.element.label.as_deref(), Some("Add"));

        // No other button in the container.
        let tree = vec![el("Other", None, vec![tree[0].children[0].clone()])];
        assert!(locate(&tree, &Locator::sibling(anchor, ElementKind::Other, ElementKind::Button)).is_none());
    }

    /// Never displayed; counts how often it was asked.
    #[derive(Default)]
    struct CountingDriver {
        display_checks: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl UiDriver for CountingDriver {
        async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
            Ok(Vec::new())
        }
        async fn is_displayed(&self, _handle: &ElementHandle) -> Result<bool, DriverError> {
            self.display_checks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(false)
        }
        async fn is_enabled(&self, _handle: &ElementHandle) -> Result<bool, DriverError> {
            Ok(true)
        }
        async fn click(&self, _handle: &ElementHandle) -> Result<(), DriverError> {
            Ok(())
        }
        async fn set_value(&self, _handle: &ElementHandle, _text: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn perform_gesture(&self, _gesture: &Gesture) -> Result<(), DriverError> {
            Ok(())
        }
        async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_displayed_uses_poll_interval() {
        let driver = CountingDriver::default();
        let handle = ElementHandle::new(Locator::id("composer"), &el("TextView", None, vec![]));

        let start = Instant::now();
        let shown = driver
            .wait_until_displayed(&handle, Duration::from_millis(1000), Duration::from_millis(400))
            .await
            .unwrap();
        assert!(!shown);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        // Checked at 0, 400, 800 and 1000ms.
        assert_eq!(driver.display_checks.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[test]
    fn test_flatten_elements_excludes_unlabeled() {
        let flat = flatten_elements(&settings_tree());
        // The root container has neither identifier nor label.
        assert_eq!(flat.len(), 5);
        assert!(flat.iter().all(|e| e.children.is_empty()));
    }
}
