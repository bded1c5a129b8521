//! Error types for element location and interaction.

use std::fmt;

use thiserror::Error;

use crate::driver::DriverError;

/// The state an existing element was expected to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Displayed,
    Enabled,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitState::Displayed => f.write_str("displayed"),
            WaitState::Enabled => f.write_str("enabled"),
        }
    }
}

/// Failures raised by the locator/interactor layer.
///
/// Existence probes never produce these; only the end of a fallback chain or
/// a failed action does.
#[derive(Error, Debug)]
pub enum LocatorError {
    /// No strategy resolved the target within its budget.
    #[error("Could not find \"{target}\": {context}")]
    NotFound { target: String, context: String },

    /// The target resolved but never reached the required state.
    #[error("Timeout after {elapsed_ms}ms: \"{target}\" exists but is not {state}")]
    Timeout {
        target: String,
        state: WaitState,
        elapsed_ms: u64,
    },

    /// A resolved handle cannot be used for the requested gesture.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl LocatorError {
    pub fn not_found(target: impl Into<String>, context: impl Into<String>) -> Self {
        LocatorError::NotFound {
            target: target.into(),
            context: context.into(),
        }
    }

    /// The sought text or locator, when the error names one.
    pub fn target(&self) -> Option<&str> {
        match self {
            LocatorError::NotFound { target, .. } | LocatorError::Timeout { target, .. } => Some(target),
            _ => None,
        }
    }
}
