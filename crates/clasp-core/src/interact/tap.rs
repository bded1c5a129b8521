use tracing::info;

use crate::chain::FallbackChain;
use crate::element::ElementKind;
use crate::error::LocatorError;
use crate::query::{contains_any_text, exact_text, Locator};

use super::Interactor;

impl Interactor {
    /// Taps the element showing exactly `text`.
    ///
    /// Tries the static text itself, then its nearest button ancestor, then
    /// its nearest cell ancestor. The cell step keeps polling until the
    /// timeout before the call fails.
    pub async fn tap_by_text(&self, text: &str) -> Result<(), LocatorError> {
        self.traced("tap_by_text", text, async {
            let resolved = tap_by_text_chain(text)
                .wait_on_last(self.config.timeout(), self.config.poll_interval())
                .resolve(self.driver.as_ref())
                .await?;
            self.click_resolved(&resolved, text).await
        })
        .await
    }

    /// Taps the first element whose name, label, or value contains `text`.
    pub async fn tap_loose(&self, text: &str) -> Result<(), LocatorError> {
        self.traced("tap_loose", text, async {
            let resolved = self.resolve(text, contains_any_text(text)).await?;
            self.click_resolved(&resolved, text).await?;
            info!(target_text = text, "tapped");
            Ok(())
        })
        .await
    }
}

/// The exact-text chain: static text, button ancestor, cell ancestor.
pub fn tap_by_text_chain(text: &str) -> FallbackChain {
    let label = exact_text(ElementKind::StaticText, text);
    FallbackChain::new(text)
        .then("static_text", label.clone())
        .then("button_ancestor", Locator::ancestor(label.clone(), ElementKind::Button))
        .then("cell_ancestor", Locator::ancestor(label, ElementKind::Cell))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ClaspConfig;
    use crate::element::UIElement;
    use crate::snapshot::{PerformedAction, SnapshotDriver};

    fn node(kind: &str, label: &str, children: Vec<UIElement>) -> UIElement {
        UIElement {
            label: Some(label.to_string()),
            element_type: Some(kind.to_string()),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn chain_order_is_text_button_cell() {
        let names: Vec<&str> = tap_by_text_chain("Cozy").strategies().iter().map(|s| s.name).collect();
        assert_eq!(names, ["static_text", "button_ancestor", "cell_ancestor"]);
    }

    #[tokio::test]
    async fn tap_loose_clicks_contains_match() {
        let driver = Arc::new(SnapshotDriver::new(vec![node("Cell", "Layout: Cozy mode", vec![])]));
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        ui.tap_loose("Cozy").await.unwrap();

        let performed = driver.performed().await;
        assert!(matches!(
            &performed[..],
            [PerformedAction::Click { element_id: Some(id), .. }] if id == "e0"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_text_times_out_on_display() {
        let mut hidden = node("StaticText", "Departments", vec![]);
        hidden.visible = Some(false);
        let driver = Arc::new(SnapshotDriver::new(vec![hidden]));
        let config = ClaspConfig::default().with_timeout(Duration::from_secs(2));
        let ui = Interactor::new(driver.clone(), config);

        let err = ui.tap_by_text("Departments").await.unwrap_err();
        assert!(matches!(err, LocatorError::Timeout { .. }), "got {err}");
        assert!(driver.performed().await.is_empty());
    }
}
