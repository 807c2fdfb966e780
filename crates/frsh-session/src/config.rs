//! Configuration for session bookkeeping.

use std::time::Duration;

use frsh_store::TreePath;

/// Default root segment under which sessions and the index live.
pub const DEFAULT_ROOT: &str = "frsh";

/// Default session lifetime: two hours.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(60 * 60 * 2);

/// Default number of concurrent sweep workers.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 50;

/// Configuration for the session facade.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root path; sessions live at `{root}/sessions`, the index at `{root}/table`.
    pub root: TreePath,

    /// Lifetime of a newly created session.
    pub expiry: Duration,

    /// Number of workers used by a sweep when none is given.
    pub sweep_concurrency: usize,

    /// Whether sweep workers re-read the primary record before reclaiming.
    /// Off by default: the index mirror alone decides.
    pub recheck_primary: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root: TreePath::root()
                .child(DEFAULT_ROOT)
                .unwrap_or_default(),
            expiry: DEFAULT_EXPIRY,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
            recheck_primary: false,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root path.
    pub fn with_root(mut self, root: TreePath) -> Self {
        self.root = root;
        self
    }

    /// Set the session lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Set the default sweep concurrency.
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency;
        self
    }

    /// Enable or disable primary-record rechecks during sweeps.
    pub fn with_recheck_primary(mut self, enabled: bool) -> Self {
        self.recheck_primary = enabled;
        self
    }

    /// Session lifetime in milliseconds, saturating at `i64::MAX`.
    pub fn expiry_millis(&self) -> i64 {
        i64::try_from(self.expiry.as_millis()).unwrap_or(i64::MAX)
    }
}
