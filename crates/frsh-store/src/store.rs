//! The tree store contract.
//!
//! This module defines the trait that decouples session bookkeeping from a
//! specific hierarchical key-value backend. Any store that can read a
//! subtree, set one path, compare-and-swap one path, and apply a set of path
//! mutations atomically can sit behind [`TreeStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::path::TreePath;

/// Closure applied by [`TreeStore::atomic_update`].
///
/// Receives the current value at the path (`None` if absent) and returns the
/// value to store, or `None` to abort. Returning `Value::Null` deletes the node.
/// Backends may call it more than once if the value changes underneath them.
pub type UpdateFn = Box<dyn FnMut(Option<&Value>) -> Option<Value> + Send>;

/// A set of path mutations applied in one atomic call.
///
/// `Value::Null` at a path deletes that node.
pub type PathBatch = BTreeMap<TreePath, Value>;

/// Outcome of an [`TreeStore::atomic_update`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Whether the new value was written.
    pub committed: bool,

    /// The value at the path after the call (the untouched value on abort).
    pub snapshot: Option<Value>,
}

/// Trait for hierarchical tree store backends.
///
/// Implement this trait to connect session bookkeeping to a store. Writing
/// `Value::Null` or an empty object anywhere removes that node, and parents
/// left empty disappear with it.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the subtree at `path`. Returns `Ok(None)` if nothing is stored there.
    async fn read(&self, path: &TreePath) -> Result<Option<Value>>;

    /// Replace the subtree at `path` with `value`.
    async fn write(&self, path: &TreePath, value: Value) -> Result<()>;

    /// Store `value` under a freshly generated child key of `path` and return the key.
    async fn push(&self, path: &TreePath, value: Value) -> Result<String>;

    /// Compare-and-swap on a single path.
    async fn atomic_update(&self, path: &TreePath, update: UpdateFn) -> Result<Transaction>;

    /// Apply every mutation in `batch` or none of them.
    ///
    /// Paths in one batch must not overlap; a path that is an ancestor of
    /// another in the same batch is rejected before anything is applied.
    async fn batch_write(&self, batch: PathBatch) -> Result<()>;

    /// Remove the subtree at `path`. Removing an absent path is not an error.
    async fn delete(&self, path: &TreePath) -> Result<()>;
}
