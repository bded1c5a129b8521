use tracing::{debug, info};

use crate::element::{ElementHandle, ElementKind};
use crate::error::LocatorError;
use crate::query::{contains_text, Locator};

use super::Interactor;

/// Target name used in composer errors and logs.
pub const COMPOSER_TARGET: &str = "message composer";

impl Interactor {
    /// Types `message` into the message composer.
    ///
    /// Uses the dedicated input control when it exists. Otherwise taps a
    /// placeholder (if one is showing) to materialize the input, then types
    /// into the first displayed text view.
    pub async fn type_composer_message(&self, message: &str) -> Result<(), LocatorError> {
        self.traced("type_composer_message", COMPOSER_TARGET, async {
            let input = self.focus_composer_input().await?.ok_or_else(|| {
                LocatorError::not_found(COMPOSER_TARGET, "composer not found")
            })?;
            if !input.by_id {
                self.settle(self.config.settle.before_set_value_ms).await;
            }
            self.driver.set_value(&input.handle, message).await?;
            info!(chars = message.chars().count(), "typed into composer");
            Ok(())
        })
        .await
    }

    /// Focuses the composer without typing. Returns whether one was found.
    pub async fn focus_composer(&self) -> Result<bool, LocatorError> {
        self.traced("focus_composer", COMPOSER_TARGET, async {
            Ok(self.focus_composer_input().await?.is_some())
        })
        .await
    }

    async fn focus_composer_input(&self) -> Result<Option<ComposerInput>, LocatorError> {
        let by_id = Locator::id(self.config.composer.input_identifier.as_str());
        if let Some(handle) = self.driver.probe(&by_id).await {
            debug!(strategy = "identifier", "composer resolved");
            self.ensure_displayed(&handle, COMPOSER_TARGET, self.config.timeout()).await?;
            self.driver.click(&handle).await?;
            return Ok(Some(ComposerInput { handle, by_id: true }));
        }

        self.tap_placeholder().await?;

        for candidate in self.driver.list_elements(&Locator::Kind(ElementKind::TextView)).await? {
            if let Ok(true) = self.driver.is_displayed(&candidate).await {
                debug!(strategy = "text_view", element = %candidate.describe(), "composer resolved");
                self.driver.click(&candidate).await?;
                return Ok(Some(ComposerInput {
                    handle: candidate,
                    by_id: false,
                }));
            }
        }

        debug!("no displayed text view");
        Ok(None)
    }

    /// Taps the first configured placeholder that is showing.
    async fn tap_placeholder(&self) -> Result<(), LocatorError> {
        for placeholder in &self.config.composer.placeholders {
            let locator = Locator::from(contains_text(ElementKind::StaticText, placeholder));
            if let Some(handle) = self.driver.probe(&locator).await {
                debug!(placeholder = placeholder.as_str(), "tapping composer placeholder");
                self.ensure_displayed(&handle, placeholder, self.config.timeout()).await?;
                self.driver.click(&handle).await?;
                self.settle(self.config.settle.after_placeholder_ms).await;
                return Ok(());
            }
        }
        Ok(())
    }
}

struct ComposerInput {
    handle: ElementHandle,
    by_id: bool,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClaspConfig;
    use crate::snapshot::{PerformedAction, SnapshotDriver};

    #[tokio::test(start_paused = true)]
    async fn placeholder_then_text_view() {
        let driver = Arc::new(
            SnapshotDriver::from_json(
                r#"[
                    {"type": "StaticText", "label": "Start a new message"},
                    {"type": "TextView", "visible": false},
                    {"type": "TextView"}
                ]"#,
            )
            .unwrap(),
        );
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        ui.type_composer_message("hi").await.unwrap();

        let performed = driver.performed().await;
        assert_eq!(performed.len(), 3);
        assert!(matches!(&performed[0], PerformedAction::Click { element_id: Some(id), .. } if id == "e0"));
        assert!(matches!(&performed[1], PerformedAction::Click { element_id: Some(id), .. } if id == "e2"));
        assert!(matches!(&performed[2], PerformedAction::SetValue { text, .. } if text == "hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_composer_is_not_found() {
        let driver = Arc::new(SnapshotDriver::from_json(r#"[{"type": "Button", "label": "Send"}]"#).unwrap());
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());

        assert!(!ui.focus_composer().await.unwrap());
        let err = ui.type_composer_message("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Could not find \"message composer\": composer not found");
    }
}
