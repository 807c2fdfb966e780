//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Root configuration.
///
/// ```toml
/// [session]
/// root = "frsh"
/// expiry_secs = 7200
///
/// [sweep]
/// concurrency = 50
/// recheck_primary = false
///
/// [logging]
/// dir = "/var/log/frsh"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrshConfig {
    /// Session layout and lifetime.
    pub session: Option<SessionSection>,

    /// Expiry sweep tuning.
    pub sweep: Option<SweepSection>,

    /// Log output.
    pub logging: Option<LoggingSection>,
}

impl FrshConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FrshConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.sweep.is_some() {
            self.sweep = other.sweep;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The `[session]` section, or its defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// The `[sweep]` section, or its defaults.
    pub fn sweep(&self) -> SweepSection {
        self.sweep.clone().unwrap_or_default()
    }

    /// The `[logging]` section, or its defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values no session store can run with.
    pub fn validate(&self) -> Result<()> {
        let session = self.session();
        if session.root.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("session.root must not be empty".to_string()));
        }
        if session.expiry_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.expiry_secs must be positive".to_string(),
            ));
        }
        if self.sweep().concurrency == 0 {
            return Err(ConfigError::Invalid(
                "sweep.concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Tree path under which `sessions/` and `table/` live.
    pub root: String,
    /// Lifetime of a new session in seconds.
    pub expiry_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            root: "frsh".to_string(),
            expiry_secs: 60 * 60 * 2,
        }
    }
}

/// `[sweep]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    /// Maximum number of concurrent sweep workers.
    pub concurrency: usize,
    /// Re-read primary records before reclaiming.
    pub recheck_primary: bool,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            concurrency: 50,
            recheck_primary: false,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Directory for daily-rolling JSON log files. Console only when unset.
    pub dir: Option<PathBuf>,
    /// Console filter directive, e.g. `frsh_session=debug`.
    pub filter: Option<String>,
}
