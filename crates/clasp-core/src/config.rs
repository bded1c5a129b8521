//! Persistent configuration for clasp.
//!
//! Stores tuning knobs in `~/.clasp/config.json`: timeouts, scroll limits,
//! gesture durations, the settle policy used after UI mutations, and the
//! identifiers of the message composer. Every field has a default, so a
//! partial file (or none at all) is fine.
//!
//! # Example
//!
//! ```no_run
//! use clasp_core::config::ClaspConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = ClaspConfig::load();
//! println!("default timeout: {:?}", config.timeout());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns the clasp data directory (`~/.clasp/`).
///
/// Falls back to the system temp directory when no home directory exists.
pub fn clasp_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".clasp")
}

/// How the interactor waits for the UI to settle after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    /// Sleep for the configured pause.
    Fixed,
    /// Poll the tree until it stops changing, bounded by the configured pause.
    Stable,
}

/// Settle policy and the pause bound for each mutation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub mode: SettleMode,
    /// Consecutive identical tree dumps required in [`SettleMode::Stable`].
    pub stable_polls: u32,
    pub after_scroll_ms: u64,
    pub after_placeholder_ms: u64,
    pub before_set_value_ms: u64,
    pub between_items_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::Stable,
            stable_polls: 2,
            after_scroll_ms: 400,
            after_placeholder_ms: 300,
            before_set_value_ms: 150,
            between_items_ms: 250,
        }
    }
}

/// Where the message composer lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Accessibility identifier of the dedicated input control.
    pub input_identifier: String,
    /// Placeholder texts that, when tapped, materialize the input.
    pub placeholders: Vec<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            input_identifier: "messageComposerTextView".to_string(),
            placeholders: vec!["Start a new message".to_string(), "Message".to_string()],
        }
    }
}

/// Persistent clasp configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaspConfig {
    /// Bound for existence and display waits, in milliseconds.
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_scrolls: u32,
    pub long_press_ms: u64,
    pub settle: SettleConfig,
    pub composer: ComposerConfig,
}

impl Default for ClaspConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            poll_interval_ms: 100,
            max_scrolls: 6,
            long_press_ms: 900,
            settle: SettleConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

impl ClaspConfig {
    /// Load config from `~/.clasp/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(clasp_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, with the same fallback as [`load`](Self::load).
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        std::fs::read_to_string(path.into())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.clasp/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = clasp_dir();
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    /// Returns a copy with a different default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}
