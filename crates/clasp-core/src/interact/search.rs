use crate::chain::FallbackChain;
use crate::element::ElementKind;
use crate::error::LocatorError;
use crate::query::{contains_text, Locator};

use super::Interactor;

impl Interactor {
    /// Taps a search result containing `text`: a button, else a static text,
    /// else the cell around a matching static text.
    ///
    /// Each step is a single existence probe; nothing is waited on until a
    /// step resolves.
    pub async fn tap_search_result(&self, text: &str) -> Result<(), LocatorError> {
        self.traced("tap_search_result", text, async {
            let resolved = search_result_chain(text).resolve(self.driver.as_ref()).await?;
            self.click_resolved(&resolved, text).await
        })
        .await
    }
}

pub fn search_result_chain(text: &str) -> FallbackChain {
    FallbackChain::new(text)
        .then("button", contains_text(ElementKind::Button, text))
        .then("static_text", contains_text(ElementKind::StaticText, text))
        .then(
            "cell_ancestor",
            Locator::ancestor(contains_text(ElementKind::StaticText, text), ElementKind::Cell),
        )
        .exhausted_context(format!("could not find result for {}", text))
}
