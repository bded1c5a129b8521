//! Scenario scoping with guaranteed release.
//!
//! [`run_scenario`] owns the lifetime of one automation session: it hands the
//! body an [`Interactor`], captures the element tree and a screenshot into the
//! [`Session`] if the body fails, and releases the driver on every exit path.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use futures::FutureExt;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ClaspConfig;
use crate::driver::UiDriver;
use crate::error::LocatorError;
use crate::interact::Interactor;
use crate::session::{Diagnostics, Session};

/// A scenario body failed.
#[derive(Error, Debug)]
#[error("scenario \"{scenario}\" failed: {source}")]
pub struct ScenarioError {
    pub scenario: String,
    #[source]
    pub source: LocatorError,
}

/// Runs `body` against `driver`, releasing the driver afterwards whether
/// the body succeeded, failed, or panicked. A panic is re-raised once the
/// driver is released and the session ended.
///
/// On failure, diagnostics are captured into `session` before release.
/// Capture problems are logged and never mask the original error.
pub async fn run_scenario<T, F, Fut>(
    driver: Arc<dyn UiDriver>,
    config: ClaspConfig,
    session: Arc<Session>,
    name: &str,
    body: F,
) -> Result<T, ScenarioError>
where
    F: FnOnce(Interactor) -> Fut,
    Fut: Future<Output = Result<T, LocatorError>>,
{
    let interactor = Interactor::new(driver.clone(), config).with_session(session.clone());
    info!(scenario = name, session_id = %session.id, "scenario started");

    let result = match AssertUnwindSafe(body(interactor)).catch_unwind().await {
        Ok(result) => result,
        Err(panic_payload) => {
            let panic_msg = panic_payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("scenario body panicked");
            error!(scenario = name, panic = panic_msg, "scenario panicked");
            if let Err(e) = driver.release().await {
                warn!(scenario = name, error = %e, "failed to release driver");
            }
            session.end().await;
            panic::resume_unwind(panic_payload);
        }
    };

    if let Err(e) = &result {
        error!(scenario = name, error = %e, "scenario failed");
        let diagnostics = capture_diagnostics(driver.as_ref(), name, e).await;
        session.record_diagnostics(diagnostics).await;
    } else {
        info!(scenario = name, "scenario passed");
    }

    if let Err(e) = driver.release().await {
        warn!(scenario = name, error = %e, "failed to release driver");
    }
    session.end().await;

    result.map_err(|source| ScenarioError {
        scenario: name.to_string(),
        source,
    })
}

/// Grabs whatever state the driver can still provide.
pub async fn capture_diagnostics(driver: &dyn UiDriver, scenario: &str, err: &LocatorError) -> Diagnostics {
    let tree = match driver.dump_tree().await {
        Ok(tree) => Some(tree),
        Err(e) => {
            warn!(error = %e, "could not dump tree for diagnostics");
            None
        }
    };
    let screenshot = match driver.screenshot().await {
        Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        Err(e) => {
            warn!(error = %e, "could not capture screenshot for diagnostics");
            None
        }
    };

    Diagnostics {
        scenario: scenario.to_string(),
        error: err.to_string(),
        captured_at: Utc::now(),
        tree,
        screenshot,
    }
}

/// `prefix` plus a short random suffix, for room names and messages that
/// must not collide across runs.
pub fn unique_text(prefix: &str, separator: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}{}", prefix, separator, &id[..8])
}
