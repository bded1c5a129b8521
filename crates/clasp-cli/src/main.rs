//! Offline diagnostics for clasp locators.
//!
//! Renders the queries the interactor sends, and dry-runs interactor
//! operations against a captured accessibility-tree snapshot (a JSON dump of
//! the element tree) to show which fallback strategy resolves and what action
//! would be issued. Nothing here talks to a device.
//!
//! # Usage
//!
//! ```bash
//! # Print the loose text predicate for a target
//! clasp predicate 'Say "hi"'
//!
//! # Print the strategies of a fallback chain
//! clasp chain tap-by-text "Conversation Layout"
//!
//! # List labelled elements in a snapshot
//! clasp elements source.json
//!
//! # Dry-run an operation against a snapshot
//! clasp resolve source.json tap-by-text "Departments" --timeout 0
//! clasp -f json resolve source.json tap-context-menu-item "Unpin"
//!
//! # List interaction logs, or show one
//! clasp logs
//! clasp logs --show pinned_messages
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use clasp_core::chain::FallbackChain;
use clasp_core::config::{clasp_dir, ClaspConfig};
use clasp_core::driver::{flatten_elements, Gesture};
use clasp_core::element::{ElementFrame, UIElement};
use clasp_core::error::LocatorError;
use clasp_core::interact::{context_menu_fallback_chain, search_result_chain, tap_by_text_chain, Interactor};
use clasp_core::query::contains_any_text;
use clasp_core::session::{InteractionLog, InteractionResult, Session};
use clasp_core::snapshot::{PerformedAction, SnapshotDriver};

/// Offline diagnostics for clasp locators.
#[derive(Parser)]
#[command(name = "clasp")]
#[command(about = "Render locator queries and dry-run interactions against UI snapshots")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Config file to use instead of ~/.clasp/config.json
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print the loose text predicate (static text, button, container, cell)
    Predicate {
        /// Text to search for
        text: String,
    },

    /// Print the strategies of a fallback chain in evaluation order
    Chain {
        chain: ChainKind,
        /// Text to search for
        text: String,
    },

    /// List labelled elements in a snapshot
    Elements {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },

    /// Dry-run an interactor operation against a snapshot
    Resolve {
        /// Snapshot JSON file
        snapshot: PathBuf,
        operation: Operation,
        /// Target text, identifier, or message depending on the operation
        text: String,
        /// Timeout in milliseconds for existence and display waits
        #[arg(short = 'o', long, env = "CLASP_TIMEOUT")]
        timeout: Option<u64>,
    },

    /// List interaction logs, or show the newest log of one session
    Logs {
        /// Session name whose newest log to print
        #[arg(long)]
        show: Option<String>,
        /// Log directory (defaults to ~/.clasp/logs)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChainKind {
    TapByText,
    SearchResult,
    ContextMenu,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    TapByText,
    TapLoose,
    TapSearchResult,
    TapContextMenuItem,
    LongPress,
    TypeComposer,
    ScrollToText,
    TapById,
    TapWhenEnabled,
    ToggleSwitch,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::TapByText => "tap_by_text",
            Operation::TapLoose => "tap_loose",
            Operation::TapSearchResult => "tap_search_result",
            Operation::TapContextMenuItem => "tap_context_menu_item",
            Operation::LongPress => "long_press_by_text",
            Operation::TypeComposer => "type_composer_message",
            Operation::ScrollToText => "scroll_to_text",
            Operation::TapById => "tap_by_id",
            Operation::TapWhenEnabled => "tap_when_enabled",
            Operation::ToggleSwitch => "toggle_switch",
        }
    }

    /// The winning strategy of the operation's fallback chain, if it has one
    /// and it resolves right now.
    async fn strategy(&self, driver: Arc<SnapshotDriver>, config: &ClaspConfig, text: &str) -> Option<&'static str> {
        match self {
            Operation::TapByText => resolved_strategy(tap_by_text_chain(text), driver.as_ref()).await,
            Operation::TapSearchResult => resolved_strategy(search_result_chain(text), driver.as_ref()).await,
            Operation::TapContextMenuItem => Interactor::new(driver, config.clone().with_timeout(Duration::ZERO))
                .locate_context_menu_item(text)
                .await
                .ok()
                .map(|r| r.strategy),
            _ => None,
        }
    }
}

async fn resolved_strategy(chain: FallbackChain, driver: &SnapshotDriver) -> Option<&'static str> {
    chain.resolve(driver).await.ok().map(|r| r.strategy)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    ActionFailed(String),
    Snapshot(String),
    Config(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::ActionFailed(_) => ExitCode::from(1),
            CliError::Snapshot(_) => ExitCode::from(2),
            CliError::Config(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::ActionFailed(msg) => write!(f, "Action failed: {}", msg),
            CliError::Snapshot(msg) => write!(f, "Snapshot error: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl From<LocatorError> for CliError {
    fn from(e: LocatorError) -> Self {
        match e {
            LocatorError::Configuration(msg) => CliError::Config(msg),
            other => CliError::ActionFailed(other.to_string()),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ClaspConfig::load_from(path),
        None => ClaspConfig::load(),
    };

    match &cli.command {
        Command::Predicate { text } => {
            let locator = contains_any_text(text);
            match cli.format {
                OutputFormat::Text => println!("{}", locator),
                OutputFormat::Json => println!("{}", serde_json::json!({ "selector": locator.selector() })),
            }
            Ok(())
        }
        Command::Chain { chain, text } => {
            let chain = match chain {
                ChainKind::TapByText => tap_by_text_chain(text),
                ChainKind::SearchResult => search_result_chain(text),
                ChainKind::ContextMenu => context_menu_fallback_chain(text),
            };
            print_chain(&chain, cli.format);
            Ok(())
        }
        Command::Elements { snapshot } => {
            let driver = load_snapshot(snapshot)?;
            let elements = flatten_elements(driver.tree());
            match cli.format {
                OutputFormat::Text => {
                    for element in &elements {
                        println!("{}", format_element_pretty(element));
                    }
                }
                OutputFormat::Json => {
                    let list: Vec<_> = elements.iter().map(element_to_concise_json).collect();
                    println!("{}", serde_json::Value::Array(list));
                }
            }
            Ok(())
        }
        Command::Resolve {
            snapshot,
            operation,
            text,
            timeout,
        } => {
            let config = match timeout {
                Some(ms) => config.with_timeout(Duration::from_millis(*ms)),
                None => config,
            };
            let driver = Arc::new(load_snapshot(snapshot)?);
            resolve(&cli, driver, config, *operation, text).await
        }
        Command::Logs { show, dir } => {
            let dir = dir.clone().unwrap_or_else(|| clasp_dir().join("logs"));
            match show {
                Some(session) => show_log(&dir, session, &cli),
                None => {
                    for (session, path) in discover_logs(&dir) {
                        println!("{}\t{}", session, path.display());
                    }
                    Ok(())
                }
            }
        }
    }
}

async fn resolve(
    cli: &Cli,
    driver: Arc<SnapshotDriver>,
    config: ClaspConfig,
    operation: Operation,
    text: &str,
) -> Result<(), CliError> {
    let strategy = operation.strategy(driver.clone(), &config, text).await;

    let session = Session::in_memory("resolve");
    let ui = Interactor::new(driver.clone(), config).with_session(session.clone());
    let result = match operation {
        Operation::TapByText => ui.tap_by_text(text).await,
        Operation::TapLoose => ui.tap_loose(text).await,
        Operation::TapSearchResult => ui.tap_search_result(text).await,
        Operation::TapContextMenuItem => ui.tap_context_menu_item(text).await,
        Operation::LongPress => ui.long_press_by_text(text).await,
        Operation::TypeComposer => ui.type_composer_message(text).await,
        Operation::ScrollToText => ui.scroll_to_text(text).await,
        Operation::TapById => ui.tap_by_id(text).await,
        Operation::TapWhenEnabled => ui.tap_when_enabled(text).await,
        Operation::ToggleSwitch => ui.toggle_switch(text).await,
    };

    if !cli.quiet {
        for log in session.interactions().await {
            eprintln!("{}", format_log_line(&log));
        }
    }

    let actions = driver.performed().await;
    match cli.format {
        OutputFormat::Text => {
            if let Some(strategy) = strategy {
                println!("strategy: {}", strategy);
            }
            for action in &actions {
                println!("{}", format_action(action));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "operation": operation.name(),
                "target": text,
                "success": result.is_ok(),
                "strategy": strategy,
                "actions": actions.iter().map(action_to_json).collect::<Vec<_>>(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", output);
        }
    }

    result.map_err(CliError::from)
}

fn load_snapshot(path: &Path) -> Result<SnapshotDriver, CliError> {
    SnapshotDriver::from_file(path)
        .map_err(|e| CliError::Snapshot(format!("{}: {}", path.display(), e)))
}

fn print_chain(chain: &FallbackChain, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for (i, strategy) in chain.strategies().iter().enumerate() {
                println!("{}. {}\t{}", i + 1, strategy.name, strategy.locator);
            }
        }
        OutputFormat::Json => {
            let list: Vec<_> = chain
                .strategies()
                .iter()
                .map(|s| serde_json::json!({ "name": s.name, "selector": s.locator.selector() }))
                .collect();
            println!("{}", serde_json::json!({ "target": chain.target(), "strategies": list }));
        }
    }
}

fn format_action(action: &PerformedAction) -> String {
    match action {
        PerformedAction::Click { element, .. } => format!("click {}", element),
        PerformedAction::SetValue { element, text, .. } => format!("set-value {} {:?}", element, text),
        PerformedAction::Gesture(gesture) => format_gesture(gesture),
    }
}

fn format_gesture(gesture: &Gesture) -> String {
    match gesture {
        Gesture::DoubleTap { element_id } => format!("double-tap {}", element_id),
        Gesture::TouchAndHold { element_id, duration } => {
            format!("touch-and-hold {} {}ms", element_id, duration.as_millis())
        }
        Gesture::Scroll { direction } => format!("scroll {}", direction.as_str()),
    }
}

fn action_to_json(action: &PerformedAction) -> serde_json::Value {
    match action {
        PerformedAction::Click { element_id, element } => serde_json::json!({
            "action": "click",
            "element_id": element_id,
            "element": element,
        }),
        PerformedAction::SetValue { element_id, element, text } => serde_json::json!({
            "action": "set_value",
            "element_id": element_id,
            "element": element,
            "text": text,
        }),
        PerformedAction::Gesture(gesture) => {
            let mut value = serde_json::json!({ "action": gesture.name() });
            match gesture {
                Gesture::DoubleTap { element_id } => {
                    value["element_id"] = serde_json::json!(element_id);
                }
                Gesture::TouchAndHold { element_id, duration } => {
                    value["element_id"] = serde_json::json!(element_id);
                    value["duration_ms"] = serde_json::json!(duration.as_millis() as u64);
                }
                Gesture::Scroll { direction } => {
                    value["direction"] = serde_json::json!(direction.as_str());
                }
            }
            value
        }
    }
}

/// Serialize a UIElement concisely: no null fields, rounded frame values.
fn element_to_concise_json(elem: &UIElement) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(ref id) = elem.element_id {
        map.insert("element_id".into(), serde_json::Value::String(id.clone()));
    }
    if let Some(ref t) = elem.element_type {
        map.insert("type".into(), serde_json::Value::String(t.clone()));
    }
    if let Some(ref id) = elem.identifier {
        map.insert("id".into(), serde_json::Value::String(id.clone()));
    }
    if let Some(ref label) = elem.label {
        map.insert("label".into(), serde_json::Value::String(label.clone()));
    }
    if let Some(ref value) = elem.value {
        map.insert("value".into(), serde_json::Value::String(value.clone()));
    }
    if let Some(ref frame) = elem.frame {
        map.insert("frame".into(), frame_to_rounded_json(frame));
    }
    map.insert("displayed".into(), serde_json::Value::Bool(elem.is_displayed()));
    serde_json::Value::Object(map)
}

fn frame_to_rounded_json(frame: &ElementFrame) -> serde_json::Value {
    serde_json::json!({
        "x": frame.x.round() as i64,
        "y": frame.y.round() as i64,
        "width": frame.width.round() as i64,
        "height": frame.height.round() as i64,
    })
}

/// Format an element as `e0.1 [Type] id "label" =value @(x,y)`
fn format_element_pretty(elem: &UIElement) -> String {
    let mut parts = Vec::new();
    if let Some(ref id) = elem.element_id {
        parts.push(id.clone());
    }
    let elem_type = elem.element_type.as_deref().unwrap_or("Unknown");
    parts.push(format!("[{}]", elem_type));
    if let Some(ref id) = elem.identifier {
        parts.push(id.clone());
    }
    if let Some(ref label) = elem.label {
        parts.push(format!("\"{}\"", label));
    }
    if let Some(ref value) = elem.value {
        parts.push(format!("={}", value));
    }
    if let Some(ref frame) = elem.frame {
        parts.push(format!("@({:.0},{:.0})", frame.x, frame.y));
    }
    if !elem.is_displayed() {
        parts.push("(hidden)".to_string());
    }
    parts.join(" ")
}

fn format_log_line(log: &InteractionLog) -> String {
    let status = match &log.result {
        InteractionResult::Success => "ok".to_string(),
        InteractionResult::Failure(msg) => format!("failed: {}", msg),
    };
    format!(
        "|{}|{}|{}|{}ms|{}|",
        log.timestamp.format("%Y-%m-%d %H:%M:%S%.3fZ"),
        log.operation,
        log.target,
        log.duration_ms,
        status
    )
}

/// Finds `{session}_{timestamp}.jsonl` files, newest last.
fn discover_logs(dir: &Path) -> Vec<(String, PathBuf)> {
    let pattern = dir.join("*.jsonl");
    let mut logs: Vec<(String, PathBuf)> = glob::glob(pattern.to_str().unwrap_or_default())
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            entry.ok().and_then(|path| {
                let session = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(session_name_from_stem)?;
                Some((session, path))
            })
        })
        .collect();
    logs.sort_by(|a, b| a.1.cmp(&b.1));
    logs
}

/// Strips the `_%Y%m%d_%H%M%S` suffix from a log file stem.
fn session_name_from_stem(stem: &str) -> Option<String> {
    let mut parts = stem.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let name = parts.next()?;
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if is_digits(time) && is_digits(date) {
        Some(name.to_string())
    } else {
        None
    }
}

fn show_log(dir: &Path, session: &str, cli: &Cli) -> Result<(), CliError> {
    let path = discover_logs(dir)
        .into_iter()
        .filter(|(name, _)| name == session)
        .map(|(_, path)| path)
        .last()
        .ok_or_else(|| CliError::ActionFailed(format!("no log for session '{}'", session)))?;

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| CliError::ActionFailed(format!("{}: {}", path.display(), e)))?;
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        match cli.format {
            OutputFormat::Json => println!("{}", line),
            OutputFormat::Text => match serde_json::from_str::<InteractionLog>(line) {
                Ok(log) => println!("{}", format_log_line(&log)),
                Err(e) => tracing::warn!(error = %e, "skipping malformed log line"),
            },
        }
    }
    Ok(())
}
