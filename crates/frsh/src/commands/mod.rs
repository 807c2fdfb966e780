//! CLI command handlers.

pub mod config;
pub mod create;
pub mod delete;
pub mod extend;
pub mod list;
pub mod sweep;
pub mod update;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use console::Style;
use frsh_config::{ConfigSource, FrshConfig, Layer};
use frsh_session::{Attributes, Frsh, Session, SessionConfig};
use frsh_store::{MemoryStore, TreePath};
use serde_json::{Value, json};

/// Configuration as resolved at startup, with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub config: FrshConfig,
    pub sources: Vec<ConfigSource>,
    pub warnings: Vec<String>,
}

impl LoadedSettings {
    /// Layered discovery: user config dir, then `./frsh.toml`.
    pub fn discover() -> Result<Self> {
        let loaded = frsh_config::load_config(None)?;
        Ok(Self {
            config: loaded.config,
            sources: loaded.sources,
            warnings: loaded.warnings,
        })
    }

    /// A single file named on the command line. Unlike discovery, a bad file is fatal.
    pub fn explicit(path: &Path) -> Result<Self> {
        let config = frsh_config::load_config_file(path)?;
        Ok(Self {
            config,
            sources: vec![ConfigSource {
                layer: Layer::Explicit,
                path: path.to_path_buf(),
                loaded: true,
            }],
            warnings: Vec::new(),
        })
    }
}

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Tree snapshot backing the store.
    pub data_path: PathBuf,
    /// Effective configuration.
    pub settings: LoadedSettings,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Session settings derived from the `[session]` and `[sweep]` sections.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let session = self.settings.config.session();
        let sweep = self.settings.config.sweep();
        let root = TreePath::parse(&session.root)
            .with_context(|| format!("invalid session.root '{}'", session.root))?;

        Ok(SessionConfig::new()
            .with_root(root)
            .with_expiry(Duration::from_secs(session.expiry_secs))
            .with_sweep_concurrency(sweep.concurrency)
            .with_recheck_primary(sweep.recheck_primary))
    }

    /// Load the snapshot into a memory store. A missing file is an empty tree.
    pub fn open_store(&self) -> Result<MemoryStore> {
        if !self.data_path.exists() {
            tracing::debug!(path = %self.data_path.display(), "No snapshot yet, starting empty");
            return Ok(MemoryStore::new());
        }
        let contents = std::fs::read_to_string(&self.data_path)
            .with_context(|| format!("failed to read {}", self.data_path.display()))?;
        let tree: Value = serde_json::from_str(&contents)
            .with_context(|| format!("{} is not a JSON tree", self.data_path.display()))?;
        Ok(MemoryStore::from_snapshot(tree))
    }

    /// Write the store back to the snapshot file.
    pub fn save_store(&self, store: &MemoryStore) -> Result<()> {
        let contents = serde_json::to_string_pretty(&store.snapshot())?;
        std::fs::write(&self.data_path, contents)
            .with_context(|| format!("failed to write {}", self.data_path.display()))?;
        tracing::debug!(path = %self.data_path.display(), "Saved snapshot");
        Ok(())
    }

    /// Facade over `store` with the effective settings.
    pub fn frsh(&self, store: &MemoryStore) -> Result<Frsh> {
        Ok(Frsh::new(Arc::new(store.clone()), self.session_config()?)?)
    }
}

/// Parse `key=value` pairs. Values that parse as JSON keep their type;
/// anything else is stored as a string.
pub fn parse_attributes(pairs: &[String]) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("attribute '{}' is not of the form key=value", pair);
        };
        if key.is_empty() {
            bail!("attribute '{}' has an empty key", pair);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        attributes.insert(key.to_string(), value);
    }
    Ok(attributes)
}

/// A session as printed with `--json`: the stored body plus its id.
pub fn session_json(session: &Session) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("id".to_string(), json!(session.id));
    body.insert("userId".to_string(), json!(session.user_id));
    body.insert("TTL".to_string(), json!(session.ttl));
    for (key, value) in &session.attributes {
        body.insert(key.clone(), value.clone());
    }
    Value::Object(body)
}

/// Human form of a millisecond timestamp.
pub fn format_ttl(ttl: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ttl) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{}ms", ttl),
    }
}

/// Print one session in the human layout.
pub fn print_session(session: &Session, verbose: bool) {
    let dim = Style::new().dim();
    println!("  {:<12} {}", "id:", session.id);
    println!("  {:<12} {}", "user:", session.user_id);
    println!(
        "  {:<12} {} {}",
        "expires:",
        format_ttl(session.ttl),
        dim.apply_to(format!("({})", session.ttl))
    );
    for (key, value) in &session.attributes {
        println!("  {:<12} {}", format!("{}:", key), value);
    }
    if verbose {
        println!("  {:<12} {}", "remaining:", remaining(session));
    }
}

fn remaining(session: &Session) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let left = session.remaining_at(now);
    format!("{}s", left / 1000)
}
