//! Ordered fallback chains.
//!
//! Every "try A, else B, else C" lookup in the interactor is a
//! [`FallbackChain`]: an ordered list of named [`Strategy`]s evaluated one at
//! a time with a non-throwing existence probe. The first strategy whose
//! locator resolves wins and later ones are never queried. When a chain is
//! configured to [`wait_on_last`](FallbackChain::wait_on_last), the final
//! strategy keeps being polled until the timeout elapses before the chain
//! gives up with [`LocatorError::NotFound`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::driver::{UiDriver, DEFAULT_POLL_INTERVAL};
use crate::element::ElementHandle;
use crate::error::LocatorError;
use crate::query::Locator;

/// One named step of a fallback chain.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: &'static str,
    pub locator: Locator,
}

impl Strategy {
    pub fn new(name: &'static str, locator: impl Into<Locator>) -> Self {
        Self {
            name,
            locator: locator.into(),
        }
    }
}

/// The outcome of a successful chain evaluation.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Name of the winning strategy.
    pub strategy: &'static str,
    /// Position of the winning strategy in the chain.
    pub index: usize,
    pub handle: ElementHandle,
    /// Time spent in the final wait. Zero when a probe resolved immediately.
    pub waited: Duration,
}

/// An ordered list of strategies for one logical target.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    target: String,
    strategies: Vec<Strategy>,
    final_wait: Option<Duration>,
    poll_interval: Duration,
    context: Option<String>,
}

impl FallbackChain {
    /// Creates an empty chain for `target` (the sought text, for errors).
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            strategies: Vec::new(),
            final_wait: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            context: None,
        }
    }

    /// Appends a strategy.
    pub fn then(mut self, name: &'static str, locator: impl Into<Locator>) -> Self {
        self.strategies.push(Strategy::new(name, locator));
        self
    }

    /// Keep polling the last strategy until `timeout` (measured from the
    /// start of [`resolve`](Self::resolve)) before failing.
    pub fn wait_on_last(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.final_wait = Some(timeout);
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the message used when the chain is exhausted.
    pub fn exhausted_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Evaluates the chain against the live UI.
    pub async fn resolve(&self, driver: &dyn UiDriver) -> Result<Resolved, LocatorError> {
        let start = Instant::now();

        for (index, strategy) in self.strategies.iter().enumerate() {
            debug!(strategy = strategy.name, locator = %strategy.locator, "probing");
            if let Some(handle) = driver.probe(&strategy.locator).await {
                info!(strategy = strategy.name, element = %handle.describe(), "resolved");
                return Ok(Resolved {
                    strategy: strategy.name,
                    index,
                    handle,
                    waited: Duration::ZERO,
                });
            }
        }

        if let (Some(timeout), Some(last)) = (self.final_wait, self.strategies.last()) {
            let wait_start = Instant::now();
            while start.elapsed() < timeout {
                let remaining = timeout.saturating_sub(start.elapsed());
                tokio::time::sleep(self.poll_interval.min(remaining)).await;
                if let Some(handle) = driver.probe(&last.locator).await {
                    info!(strategy = last.name, element = %handle.describe(), "resolved after waiting");
                    return Ok(Resolved {
                        strategy: last.name,
                        index: self.strategies.len() - 1,
                        handle,
                        waited: wait_start.elapsed(),
                    });
                }
            }
        }

        let context = self.context.clone().unwrap_or_else(|| {
            let names: Vec<&str> = self.strategies.iter().map(|s| s.name).collect();
            format!("no strategy matched ({})", names.join(", "))
        });
        Err(LocatorError::not_found(&self.target, context))
    }
}
