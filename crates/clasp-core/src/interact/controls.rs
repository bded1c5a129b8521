use tracing::{debug, info};

use crate::driver::Gesture;
use crate::element::ElementKind;
use crate::error::LocatorError;
use crate::query::{exact_text, Locator, Predicate};

use super::Interactor;

impl Interactor {
    /// Waits for the element with accessibility id `id` to be displayed,
    /// then taps it.
    pub async fn tap_by_id(&self, id: &str) -> Result<(), LocatorError> {
        self.traced("tap_by_id", id, async {
            let resolved = self.resolve(id, Locator::id(id)).await?;
            self.click_resolved(&resolved, id).await
        })
        .await
    }

    /// Waits for the element with accessibility id `id` to be enabled, then
    /// taps it. For buttons that stay disabled until a form is valid.
    pub async fn tap_when_enabled(&self, id: &str) -> Result<(), LocatorError> {
        self.traced("tap_when_enabled", id, async {
            let resolved = self.resolve(id, Locator::id(id)).await?;
            let budget = self.config.timeout().saturating_sub(resolved.waited);
            self.ensure_enabled(&resolved.handle, id, budget).await?;
            self.driver.click(&resolved.handle).await?;
            Ok(())
        })
        .await
    }

    pub async fn set_value_by_id(&self, id: &str, text: &str) -> Result<(), LocatorError> {
        self.traced("set_value_by_id", id, async {
            let resolved = self.resolve(id, Locator::id(id)).await?;
            self.click_resolved(&resolved, id).await?;
            self.driver.set_value(&resolved.handle, text).await?;
            Ok(())
        })
        .await
    }

    /// Toggles the switch labelled `label`, or failing that the first
    /// displayed switch on screen.
    pub async fn toggle_switch(&self, label: &str) -> Result<(), LocatorError> {
        self.traced("toggle_switch", label, async {
            let labelled = Locator::from(exact_text(ElementKind::Switch, label));
            if let Some(handle) = self.driver.probe(&labelled).await {
                self.ensure_displayed(&handle, label, self.config.timeout()).await?;
                self.driver.click(&handle).await?;
                info!(strategy = "labelled", "toggled switch");
                return Ok(());
            }

            for candidate in self.driver.list_elements(&Locator::Kind(ElementKind::Switch)).await? {
                if let Ok(true) = self.driver.is_displayed(&candidate).await {
                    self.driver.click(&candidate).await?;
                    info!(strategy = "first_visible", "toggled switch");
                    return Ok(());
                }
            }

            Err(LocatorError::not_found(label, "no labelled or visible switch"))
        })
        .await
    }

    /// Taps the first of `locators` that is present. Returns whether anything
    /// was tapped; absence is not an error.
    pub async fn tap_first_present(&self, target: &str, locators: &[Locator]) -> Result<bool, LocatorError> {
        self.traced("tap_first_present", target, async {
            for locator in locators {
                if let Some(handle) = self.driver.probe(locator).await {
                    debug!(locator = %locator, "present");
                    self.driver.click(&handle).await?;
                    return Ok(true);
                }
            }
            debug!("none present");
            Ok(false)
        })
        .await
    }

    /// Opens a collapsible section, taps each item in it, and closes it
    /// again.
    pub async fn toggle_section_items(&self, section: &str, items: &[&str]) -> Result<(), LocatorError> {
        self.tap_by_text(section).await?;
        for item in items {
            self.tap_loose(item).await?;
            self.settle(self.config.settle.between_items_ms).await;
        }
        self.tap_by_text(section).await
    }

    /// Taps the first `kind` child of the nearest `container` around the
    /// element matched by `anchor`, once the anchor is displayed. Reaches
    /// unlabelled controls such as the "+" beside a section header.
    pub async fn tap_sibling_of(
        &self,
        anchor: Predicate,
        container: ElementKind,
        kind: ElementKind,
    ) -> Result<(), LocatorError> {
        let target = Locator::from(anchor.clone()).to_string();
        self.traced("tap_sibling_of", &target, async {
            let header = self.resolve(&target, anchor.clone()).await?;
            let budget = self.config.timeout().saturating_sub(header.waited);
            self.ensure_displayed(&header.handle, &target, budget).await?;

            let sibling = self
                .resolve(&target, Locator::sibling(anchor, container, kind))
                .await?;
            debug!(element = %sibling.handle.describe(), "sibling of anchor");
            self.click_resolved(&sibling, &target).await
        })
        .await
    }

    /// Double-taps the element matched by `locator` once it is displayed.
    pub async fn double_tap(&self, locator: &Locator) -> Result<(), LocatorError> {
        let target = locator.to_string();
        self.traced("double_tap", &target, async {
            let resolved = self.resolve(&target, locator.clone()).await?;
            let budget = self.config.timeout().saturating_sub(resolved.waited);
            self.ensure_displayed(&resolved.handle, &target, budget).await?;
            let element_id = resolved.handle.element_id.clone().ok_or_else(|| {
                LocatorError::Configuration(format!("could not resolve element id for double tap on {}", target))
            })?;
            self.driver.perform_gesture(&Gesture::DoubleTap { element_id }).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ClaspConfig;
    use crate::snapshot::{PerformedAction, SnapshotDriver};

    fn form_driver() -> Arc<SnapshotDriver> {
        Arc::new(
            SnapshotDriver::from_json(
                r#"[
                    {"type": "Other", "name": "loginView"},
                    {"type": "TextField", "name": "emailField"},
                    {"type": "Button", "name": "loginButton", "enabled": false},
                    {"type": "Switch", "label": "Notifications", "visible": false},
                    {"type": "Switch", "label": "Create private room"}
                ]"#,
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn set_value_by_id_clicks_then_types() {
        let driver = form_driver();
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        ui.set_value_by_id("emailField", "me@example.com").await.unwrap();

        let performed = driver.performed().await;
        assert_eq!(performed.len(), 2);
        assert!(matches!(&performed[1], PerformedAction::SetValue { text, .. } if text == "me@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_button_times_out() {
        let driver = form_driver();
        let config = ClaspConfig::default().with_timeout(Duration::from_secs(1));
        let ui = Interactor::new(driver.clone(), config);

        let err = ui.tap_when_enabled("loginButton").await.unwrap_err();
        assert!(err.to_string().contains("is not enabled"), "got {err}");
        assert!(driver.performed().await.is_empty());
    }

    #[tokio::test]
    async fn toggle_switch_falls_back_to_first_visible() {
        let driver = form_driver();
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        ui.toggle_switch("Private").await.unwrap();

        let performed = driver.performed().await;
        assert!(matches!(
            &performed[..],
            [PerformedAction::Click { element_id: Some(id), .. }] if id == "e4"
        ));
    }

    #[tokio::test]
    async fn tap_first_present_reports_absence() {
        let driver = form_driver();
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        let tapped = ui
            .tap_first_present("emoji key", &[Locator::id("Next keyboard"), Locator::id("emoji")])
            .await
            .unwrap();
        assert!(!tapped);
    }

    #[tokio::test]
    async fn tap_sibling_of_clicks_control_beside_header() {
        let driver = Arc::new(
            SnapshotDriver::from_json(
                r#"[{"type": "Other", "children": [
                    {"type": "Other", "children": [
                        {"type": "Button", "name": "Rooms section header"},
                        {"type": "Button", "label": "Add"}
                    ]},
                    {"type": "Button", "label": "Settings"}
                ]}]"#,
            )
            .unwrap(),
        );
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        let header = Predicate::kind(ElementKind::Button)
            .equals("Rooms section header")
            .on(&[crate::query::Attribute::Name]);

        ui.tap_sibling_of(header, ElementKind::Other, ElementKind::Button)
            .await
            .unwrap();

        let performed = driver.performed().await;
        assert!(matches!(
            &performed[..],
            [PerformedAction::Click { element_id: Some(id), .. }] if id == "e0.0.1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tap_sibling_of_without_sibling_is_not_found() {
        let driver = Arc::new(
            SnapshotDriver::from_json(
                r#"[{"type": "Other", "children": [
                    {"type": "Button", "name": "Rooms section header"}
                ]}]"#,
            )
            .unwrap(),
        );
        let ui = Interactor::new(driver.clone(), ClaspConfig::default().with_timeout(Duration::from_secs(1)));
        let header = Predicate::kind(ElementKind::Button)
            .equals("Rooms section header")
            .on(&[crate::query::Attribute::Name]);

        let err = ui
            .tap_sibling_of(header, ElementKind::Other, ElementKind::Button)
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::NotFound { .. }));
        assert!(driver.performed().await.is_empty());
    }

    #[tokio::test]
    async fn double_tap_uses_element_id() {
        let driver = form_driver();
        let ui = Interactor::new(driver.clone(), ClaspConfig::default());
        ui.double_tap(&Locator::id("loginView")).await.unwrap();

        assert_eq!(
            driver.performed().await,
            vec![PerformedAction::Gesture(Gesture::DoubleTap {
                element_id: "e0".to_string()
            })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn presence_check_never_fails() {
        let driver = form_driver();
        let ui = Interactor::new(driver, ClaspConfig::default());
        assert!(ui.is_present_within(&Locator::id("loginView"), Duration::from_millis(1500)).await);
        assert!(!ui.is_present_within(&Locator::id("roomsList"), Duration::from_millis(1500)).await);
    }
}
