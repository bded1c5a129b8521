//! Waiting for the UI to settle after a mutation.
//!
//! After a scroll, a placeholder tap, or a focus change the UI renders
//! asynchronously. [`settle`] waits for that to finish according to the
//! configured [`SettleMode`]: either a fixed sleep, or polling the tree until
//! consecutive dumps are identical, bounded by the same pause. Settling never
//! fails; hitting the bound or a dump error just ends the wait.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::{SettleConfig, SettleMode};
use crate::driver::UiDriver;

/// Waits for the UI to settle, for at most `bound`.
pub async fn settle(driver: &dyn UiDriver, config: &SettleConfig, bound: Duration, poll_interval: Duration) {
    match config.mode {
        SettleMode::Fixed => tokio::time::sleep(bound).await,
        SettleMode::Stable => settle_stable(driver, config.stable_polls.max(1), bound, poll_interval).await,
    }
}

async fn settle_stable(driver: &dyn UiDriver, required: u32, bound: Duration, poll_interval: Duration) {
    let start = Instant::now();
    let mut last = None;
    let mut stable: u32 = 0;

    loop {
        match driver.dump_tree().await {
            Ok(tree) => {
                if last.as_ref() == Some(&tree) {
                    stable += 1;
                } else {
                    stable = 1;
                    last = Some(tree);
                }
            }
            Err(e) => {
                debug!(error = %e, "tree dump failed while settling");
                return;
            }
        }

        if stable >= required {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "ui settled");
            return;
        }
        let elapsed = start.elapsed();
        if elapsed >= bound {
            debug!(bound_ms = bound.as_millis() as u64, "settle bound reached");
            return;
        }
        tokio::time::sleep(poll_interval.min(bound - elapsed)).await;
    }
}
