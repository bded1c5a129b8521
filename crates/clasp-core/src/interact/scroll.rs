use tracing::debug;

use crate::driver::{Gesture, ScrollDirection};
use crate::error::LocatorError;
use crate::query::contains_any_text;

use super::Interactor;

impl Interactor {
    /// Scrolls down until an element containing `text` exists, up to the
    /// configured `max_scrolls`.
    pub async fn scroll_to_text(&self, text: &str) -> Result<(), LocatorError> {
        self.scroll_to_text_with(text, self.config.max_scrolls).await
    }

    /// Like [`scroll_to_text`](Self::scroll_to_text) with an explicit limit.
    ///
    /// Each attempt probes first, so a target already on screen costs no
    /// scroll. Scroll gesture failures are ignored.
    pub async fn scroll_to_text_with(&self, text: &str, max_scrolls: u32) -> Result<(), LocatorError> {
        self.traced("scroll_to_text", text, async {
            let locator = contains_any_text(text);
            let scroll = Gesture::Scroll {
                direction: ScrollDirection::Down,
            };

            for attempt in 0..max_scrolls {
                if self.driver.probe(&locator).await.is_some() {
                    debug!(scrolls = attempt, "target visible");
                    return Ok(());
                }
                if let Err(e) = self.driver.perform_gesture(&scroll).await {
                    debug!(error = %e, "scroll failed, continuing");
                }
                self.settle(self.config.settle.after_scroll_ms).await;
            }

            Err(LocatorError::not_found(
                text,
                format!("not found after {} scrolls", max_scrolls),
            ))
        })
        .await
    }
}
