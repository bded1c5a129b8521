//! Interaction log and event broadcasting for an automation run.
//!
//! A [`Session`] records every interactor operation (which operation, which
//! target text, whether it succeeded, how long it took) so a failed scenario
//! can be traced back to the exact tap that went wrong.
//!
//! # Architecture
//!
//! - Interactions are kept in a ring buffer (up to 1000 entries)
//! - Diagnostic captures from failed scenarios are stored and broadcast
//! - Subscribers receive [`SessionEvent`]s through a broadcast channel
//! - Entries are optionally persisted as JSON Lines under `~/.clasp/logs/`
//!
//! # Example
//!
//! ```no_run
//! use clasp_core::session::{InteractionResult, Session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = Session::new("pinned_messages");
//!     let mut rx = session.subscribe();
//!
//!     session.record("tap_loose", "Cozy", InteractionResult::Success, 42).await;
//! }
//! ```

use std::collections::VecDeque;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::config::clasp_dir;
use crate::element::UIElement;

/// Maximum number of interaction entries retained in the ring buffer.
const MAX_INTERACTION_LOG_SIZE: usize = 1000;

fn logs_dir() -> PathBuf {
    clasp_dir().join("logs")
}

/// The result of an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteractionResult {
    Success,
    Failure(String),
}

/// A logged interactor operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Operation name, e.g. `"tap_by_text"`.
    pub operation: String,
    /// The sought text or locator.
    pub target: String,
    pub result: InteractionResult,
    pub duration_ms: u64,
}

/// State captured when a scenario fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub scenario: String,
    pub error: String,
    pub captured_at: DateTime<Utc>,
    /// The element tree at failure time, if it could be dumped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Vec<UIElement>>,
    /// Base64-encoded PNG, if a screenshot could be taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Events broadcast to subscribers when session state changes.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    InteractionLogged(InteractionLog),
    Diagnostics(Arc<Diagnostics>),
    Ended,
}

/// Shared interaction log for one automation run.
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    interactions: RwLock<VecDeque<InteractionLog>>,
    last_diagnostics: RwLock<Option<Arc<Diagnostics>>>,
    event_tx: broadcast::Sender<SessionEvent>,
    log_writer: Mutex<Option<BufWriter<std::fs::File>>>,
}

impl Session {
    /// Creates a session persisting to `~/.clasp/logs/{name}_{timestamp}.jsonl`.
    pub fn new(name: &str) -> Arc<Self> {
        Self::new_with_log_dir(name, logs_dir())
    }

    /// Creates a session persisting its log under `dir`.
    ///
    /// If the file cannot be created the session still works, in memory only.
    pub fn new_with_log_dir(name: &str, dir: PathBuf) -> Arc<Self> {
        let created_at = Utc::now();
        let writer = std::fs::create_dir_all(&dir).ok().and_then(|_| {
            let timestamp = created_at.format("%Y%m%d_%H%M%S");
            std::fs::File::create(dir.join(format!("{}_{}.jsonl", name, timestamp)))
                .ok()
                .map(BufWriter::new)
        });
        Self::build(name, created_at, writer)
    }

    /// Creates a session that keeps its log in memory only.
    pub fn in_memory(name: &str) -> Arc<Self> {
        Self::build(name, Utc::now(), None)
    }

    fn build(name: &str, created_at: DateTime<Utc>, writer: Option<BufWriter<std::fs::File>>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at,
            interactions: RwLock::new(VecDeque::with_capacity(MAX_INTERACTION_LOG_SIZE)),
            last_diagnostics: RwLock::new(None),
            event_tx,
            log_writer: Mutex::new(writer),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Records an interaction, persists it, and broadcasts it.
    pub async fn record(
        &self,
        operation: &str,
        target: &str,
        result: InteractionResult,
        duration_ms: u64,
    ) -> InteractionLog {
        let log = InteractionLog {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation: operation.to_string(),
            target: target.to_string(),
            result,
            duration_ms,
        };

        {
            let mut interactions = self.interactions.write().await;
            if interactions.len() >= MAX_INTERACTION_LOG_SIZE {
                interactions.pop_front();
            }
            interactions.push_back(log.clone());
        }

        self.persist(&log).await;

        // No subscribers is fine.
        let _ = self.event_tx.send(SessionEvent::InteractionLogged(log.clone()));
        log
    }

    /// Stores diagnostics from a failed scenario and broadcasts them.
    pub async fn record_diagnostics(&self, diagnostics: Diagnostics) -> Arc<Diagnostics> {
        let diagnostics = Arc::new(diagnostics);
        *self.last_diagnostics.write().await = Some(diagnostics.clone());
        let _ = self
            .event_tx
            .send(SessionEvent::Diagnostics(diagnostics.clone()));
        diagnostics
    }

    /// Marks the session as finished and flushes the log file.
    pub async fn end(&self) {
        if let Some(writer) = self.log_writer.lock().await.as_mut() {
            let _ = writer.flush();
        }
        let _ = self.event_tx.send(SessionEvent::Ended);
    }

    /// All retained interactions, oldest first.
    pub async fn interactions(&self) -> Vec<InteractionLog> {
        self.interactions.read().await.iter().cloned().collect()
    }

    pub async fn last_diagnostics(&self) -> Option<Arc<Diagnostics>> {
        self.last_diagnostics.read().await.clone()
    }

    async fn persist(&self, log: &InteractionLog) {
        let mut guard = self.log_writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            if let Ok(json) = serde_json::to_string(log) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("interactions", &"<RwLock<VecDeque<InteractionLog>>>")
            .field("event_tx", &"<broadcast::Sender>")
            .finish()
    }
}
