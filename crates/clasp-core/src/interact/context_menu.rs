use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::chain::{FallbackChain, Resolved};
use crate::driver::Gesture;
use crate::element::{ElementHandle, ElementKind};
use crate::error::LocatorError;
use crate::query::{contains_text, Attribute, Locator, Predicate};

use super::Interactor;

impl Interactor {
    /// Finds the message bubble (a button) containing `text`, waiting for it
    /// to exist and be displayed.
    pub async fn find_message_bubble(&self, text: &str) -> Result<ElementHandle, LocatorError> {
        self.traced("find_message_bubble", text, async {
            let resolved = self.resolve(text, contains_text(ElementKind::Button, text)).await?;
            let budget = self.config.timeout().saturating_sub(resolved.waited);
            self.ensure_displayed(&resolved.handle, text, budget).await?;
            Ok(resolved.handle)
        })
        .await
    }

    /// Touches and holds `handle` for `duration`.
    ///
    /// Fails with [`LocatorError::Configuration`] if the handle carries no
    /// element id to address the gesture to.
    pub async fn long_press(&self, handle: &ElementHandle, duration: Duration) -> Result<(), LocatorError> {
        let target = handle.describe();
        self.traced("long_press", &target, async {
            let element_id = handle.element_id.clone().ok_or_else(|| {
                LocatorError::Configuration(format!(
                    "could not resolve element id for long press on {}",
                    target
                ))
            })?;
            self.driver
                .perform_gesture(&Gesture::TouchAndHold { element_id, duration })
                .await?;
            Ok(())
        })
        .await
    }

    /// Long-presses the message bubble containing `text`.
    pub async fn long_press_by_text(&self, text: &str) -> Result<(), LocatorError> {
        let bubble = self.find_message_bubble(text).await?;
        self.long_press(&bubble, self.config.long_press()).await
    }

    /// Taps the context-menu entry containing `text`.
    ///
    /// Tries a button, then a static text (preferring its own button or cell
    /// ancestor over the text itself), then a cell, and finally any element
    /// whose name or label contains the text, waited on for the full timeout.
    pub async fn tap_context_menu_item(&self, text: &str) -> Result<(), LocatorError> {
        self.traced("tap_context_menu_item", text, async {
            let resolved = self.resolve_menu_item(text).await?;
            self.click_resolved(&resolved, text).await
        })
        .await
    }

    /// Resolves the context-menu entry [`tap_context_menu_item`] would tap,
    /// without tapping it.
    ///
    /// [`tap_context_menu_item`]: Interactor::tap_context_menu_item
    pub async fn locate_context_menu_item(&self, text: &str) -> Result<Resolved, LocatorError> {
        self.traced("locate_context_menu_item", text, self.resolve_menu_item(text))
            .await
    }

    async fn resolve_menu_item(&self, text: &str) -> Result<Resolved, LocatorError> {
        let button = Locator::from(contains_text(ElementKind::Button, text));
        if let Some(handle) = self.driver.probe(&button).await {
            debug!(strategy = "button", "resolved");
            return Ok(Resolved {
                strategy: "button",
                index: 0,
                handle,
                waited: Duration::ZERO,
            });
        }

        let label = Locator::from(contains_text(ElementKind::StaticText, text));
        if let Some(text_handle) = self.driver.probe(&label).await {
            let start = Instant::now();
            self.ensure_displayed(&text_handle, text, self.config.timeout()).await?;
            let (strategy, handle) = self.around_text(text_handle).await;
            debug!(strategy, "resolved");
            return Ok(Resolved {
                strategy,
                index: 1,
                handle,
                waited: start.elapsed(),
            });
        }

        let mut resolved = context_menu_fallback_chain(text)
            .wait_on_last(self.config.timeout(), self.config.poll_interval())
            .resolve(self.driver.as_ref())
            .await?;
        resolved.index += 2;
        Ok(resolved)
    }

    /// The nearest button, else cell, enclosing this very text node, else
    /// the text itself.
    async fn around_text(&self, text_handle: ElementHandle) -> (&'static str, ElementHandle) {
        for (strategy, kind) in [
            ("button_ancestor", ElementKind::Button),
            ("cell_ancestor", ElementKind::Cell),
        ] {
            match self.driver.find_ancestor(&text_handle, kind).await {
                Ok(Some(ancestor)) => {
                    info!(ancestor = %kind, "using ancestor of menu text");
                    return (strategy, ancestor);
                }
                Ok(None) => {}
                Err(e) => debug!(ancestor = %kind, error = %e, "ancestor lookup failed, treating as absent"),
            }
        }
        ("static_text", text_handle)
    }
}

/// Context-menu steps after the button and static-text lookups: a cell, then
/// anything whose name or label contains the text.
pub fn context_menu_fallback_chain(text: &str) -> FallbackChain {
    FallbackChain::new(text)
        .then("cell", contains_text(ElementKind::Cell, text))
        .then(
            "any",
            Predicate::any().contains(text).on(&[Attribute::Name, Attribute::Label]),
        )
}
