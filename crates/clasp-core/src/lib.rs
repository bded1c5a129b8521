//! # clasp-core
//!
//! Resilient element location and interaction for accessibility-tree UI
//! automation.
//!
//! Mobile UI identifiers are unstable: the same control may surface as a
//! static text, as a button wrapping that text, or as a table cell. This
//! crate resolves human-described targets ("the text X", "the message bubble
//! containing Y") by trying ordered fallback strategies, waits for the
//! resolved element to be ready, and performs the action, failing with a
//! typed error once every strategy is exhausted.
//!
//! ## Modules
//!
//! - [`element`] - Accessibility tree nodes and resolved element handles
//! - [`query`] - Locator queries and their predicate/XPath rendering
//! - [`driver`] - The [`UiDriver`](driver::UiDriver) trait consumed from an automation backend
//! - [`chain`] - Ordered fallback-chain evaluation
//! - [`settle`] - Waiting for the UI to stop changing after a mutation
//! - [`interact`] - The [`Interactor`](interact::Interactor) operations
//! - [`scenario`] - Scenario scoping with guaranteed driver release
//! - [`session`] - Interaction log and event broadcasting
//! - [`snapshot`] - An in-memory driver over a captured tree
//! - [`config`] - Persistent configuration
//! - [`error`] - Locator error types
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clasp_core::config::ClaspConfig;
//! use clasp_core::scenario::{run_scenario, unique_text};
//! use clasp_core::session::Session;
//! use clasp_core::snapshot::SnapshotDriver;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(SnapshotDriver::from_file("source.json")?);
//! let session = Session::new("pinned_messages");
//! let message = unique_text("Message test", " ");
//!
//! run_scenario(driver, ClaspConfig::load(), session, "pinned_messages", |ui| async move {
//!     ui.tap_search_result("General").await?;
//!     ui.type_composer_message(&message).await?;
//!     ui.tap_when_enabled("sendMessageButton").await?;
//!     ui.long_press_by_text(&message).await?;
//!     ui.tap_context_menu_item("Pin").await
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod driver;
pub mod element;
pub mod error;
pub mod interact;
pub mod query;
pub mod scenario;
pub mod session;
pub mod settle;
pub mod snapshot;
