//! Resilient interactions with on-screen elements.
//!
//! [`Interactor`] turns a human-described target ("the text X", "the message
//! bubble containing Y") into a concrete element, trying fallback strategies
//! in a fixed order, then performs the action. Every public operation runs in
//! its own tracing span and, when a [`Session`] is attached, is recorded in
//! its interaction log.
//!
//! Handles are never cached across operations: each operation re-resolves its
//! target against the live UI before acting.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clasp_core::config::ClaspConfig;
//! use clasp_core::interact::Interactor;
//! use clasp_core::snapshot::SnapshotDriver;
//!
//! # async fn demo() -> Result<(), clasp_core::error::LocatorError> {
//! let driver = Arc::new(SnapshotDriver::from_file("source.json")?);
//! let ui = Interactor::new(driver, ClaspConfig::load());
//!
//! ui.scroll_to_text("Conversation Layout").await?;
//! ui.tap_by_text("Conversation Layout").await?;
//! ui.tap_loose("Cozy").await?;
//! # Ok(())
//! # }
//! ```

mod composer;
mod context_menu;
mod controls;
mod scroll;
mod search;
mod tap;

pub use composer::COMPOSER_TARGET;
pub use context_menu::context_menu_fallback_chain;
pub use search::search_result_chain;
pub use tap::tap_by_text_chain;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::chain::{FallbackChain, Resolved};
use crate::config::ClaspConfig;
use crate::driver::UiDriver;
use crate::element::ElementHandle;
use crate::error::{LocatorError, WaitState};
use crate::query::Locator;
use crate::session::{InteractionResult, Session};
use crate::settle::settle;

/// Performs resilient lookups and actions against one live UI session.
#[derive(Clone)]
pub struct Interactor {
    driver: Arc<dyn UiDriver>,
    config: ClaspConfig,
    session: Option<Arc<Session>>,
}

impl Interactor {
    pub fn new(driver: Arc<dyn UiDriver>, config: ClaspConfig) -> Self {
        Self {
            driver,
            config,
            session: None,
        }
    }

    /// Attaches a session that records every operation.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn driver(&self) -> &Arc<dyn UiDriver> {
        &self.driver
    }

    pub fn config(&self) -> &ClaspConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// Runs one operation inside a span and records its outcome.
    async fn traced<T, F>(&self, operation: &'static str, target: &str, fut: F) -> Result<T, LocatorError>
    where
        F: Future<Output = Result<T, LocatorError>>,
    {
        let span = info_span!("interact", operation, text = target);
        let start = Instant::now();
        let result = fut.instrument(span).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(operation, text = target, elapsed_ms, success = result.is_ok(), "interaction complete");

        if let Some(session) = &self.session {
            let outcome = match &result {
                Ok(_) => InteractionResult::Success,
                Err(e) => InteractionResult::Failure(e.to_string()),
            };
            session.record(operation, target, outcome, elapsed_ms).await;
        }
        result
    }

    /// Waits for the UI to settle after a mutation, for at most `pause_ms`.
    async fn settle(&self, pause_ms: u64) {
        settle(
            self.driver.as_ref(),
            &self.config.settle,
            Duration::from_millis(pause_ms),
            self.config.poll_interval(),
        )
        .await;
    }

    /// Polls `locator` for existence until the configured timeout.
    async fn resolve(&self, target: &str, locator: impl Into<Locator>) -> Result<Resolved, LocatorError> {
        self.resolve_within(target, locator, self.config.timeout()).await
    }

    async fn resolve_within(
        &self,
        target: &str,
        locator: impl Into<Locator>,
        timeout: Duration,
    ) -> Result<Resolved, LocatorError> {
        FallbackChain::new(target)
            .then("locator", locator)
            .wait_on_last(timeout, self.config.poll_interval())
            .exhausted_context(format!("not present after {}ms", timeout.as_millis()))
            .resolve(self.driver.as_ref())
            .await
    }

    /// Fails with [`LocatorError::Timeout`] unless `handle` becomes displayed
    /// within `budget`.
    async fn ensure_displayed(
        &self,
        handle: &ElementHandle,
        target: &str,
        budget: Duration,
    ) -> Result<(), LocatorError> {
        let start = Instant::now();
        if self
            .driver
            .wait_until_displayed(handle, budget, self.config.poll_interval())
            .await? {
            return Ok(());
        }
        Err(LocatorError::Timeout {
            target: target.to_string(),
            state: WaitState::Displayed,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn ensure_enabled(
        &self,
        handle: &ElementHandle,
        target: &str,
        budget: Duration,
    ) -> Result<(), LocatorError> {
        let start = Instant::now();
        if self
            .driver
            .wait_until_enabled(handle, budget, self.config.poll_interval())
            .await? {
            return Ok(());
        }
        Err(LocatorError::Timeout {
            target: target.to_string(),
            state: WaitState::Enabled,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Waits for display using whatever is left of the timeout, then clicks.
    async fn click_resolved(&self, resolved: &Resolved, target: &str) -> Result<(), LocatorError> {
        let budget = self.config.timeout().saturating_sub(resolved.waited);
        self.ensure_displayed(&resolved.handle, target, budget).await?;
        self.driver.click(&resolved.handle).await?;
        Ok(())
    }

    /// Resolves `locator` and waits for it to be displayed, both within
    /// `timeout`.
    pub async fn wait_displayed(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, LocatorError> {
        let target = locator.to_string();
        self.traced("wait_displayed", &target, async {
            let resolved = self.resolve_within(&target, locator.clone(), timeout).await?;
            self.ensure_displayed(&resolved.handle, &target, timeout.saturating_sub(resolved.waited))
                .await?;
            Ok(resolved.handle)
        })
        .await
    }

    /// Bounded existence check that never fails.
    pub async fn is_present_within(&self, locator: &Locator, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.driver.probe(locator).await.is_some() {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(locator = %locator, "not present within bound");
                return false;
            }
            tokio::time::sleep(self.config.poll_interval().min(timeout - elapsed)).await;
        }
    }
}

impl std::fmt::Debug for Interactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interactor")
            .field("driver", &"<dyn UiDriver>")
            .field("config", &self.config)
            .field("session", &self.session.as_ref().map(|s| s.id))
            .finish()
    }
}
