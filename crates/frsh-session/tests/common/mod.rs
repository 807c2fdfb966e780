//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use frsh_session::{CancellationToken, Clock, Frsh, ManualClock, SessionConfig};
use frsh_store::{
    MemoryStore, PathBatch, Result, StoreError, Transaction, TreePath, TreeStore, UpdateFn,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Fixed "now" used across integration tests.
pub const NOW: i64 = 1_700_000_000_000;

/// A [`MemoryStore`] wrapper that fails selected calls on demand.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Fail keyed writes under any `table` path.
    pub fail_index_writes: AtomicBool,
    /// Fail deletes.
    pub fail_deletes: AtomicBool,
    /// Fail any batch write addressing a path ending in this key.
    pub fail_batch_with_key: Mutex<Option<String>>,
    /// Return this id from `push` instead of generating one.
    pub forced_push_id: Mutex<Option<String>>,
    /// Number of batch writes attempted.
    pub batch_writes: AtomicUsize,
    /// Paths deleted right before the next `atomic_update` runs.
    pub delete_before_update: Mutex<Vec<TreePath>>,
    /// Paths deleted right after the next `atomic_update` returns.
    pub delete_after_update: Mutex<Vec<TreePath>>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TreeStore for FaultyStore {
    async fn read(&self, path: &TreePath) -> Result<Option<Value>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &TreePath, value: Value) -> Result<()> {
        let is_index = path.segments().iter().any(|s| s == "table");
        if is_index && self.fail_index_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("index write refused".to_string()));
        }
        self.inner.write(path, value).await
    }

    async fn push(&self, path: &TreePath, value: Value) -> Result<String> {
        let forced = self.forced_push_id.lock().clone();
        match forced {
            Some(id) => {
                if let Ok(child) = path.child(&id) {
                    if self.inner.read(&child).await?.is_some() {
                        return Err(StoreError::AlreadyExists(child.to_string()));
                    }
                    self.inner.write(&child, value).await?;
                }
                Ok(id)
            }
            None => self.inner.push(path, value).await,
        }
    }

    async fn atomic_update(&self, path: &TreePath, update: UpdateFn) -> Result<Transaction> {
        let before = std::mem::take(&mut *self.delete_before_update.lock());
        for doomed in &before {
            self.inner.delete(doomed).await?;
        }
        let tx = self.inner.atomic_update(path, update).await?;
        let after = std::mem::take(&mut *self.delete_after_update.lock());
        for doomed in &after {
            self.inner.delete(doomed).await?;
        }
        Ok(tx)
    }

    async fn batch_write(&self, batch: PathBatch) -> Result<()> {
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        let poison = self.fail_batch_with_key.lock().clone();
        if let Some(key) = poison
            && batch.keys().any(|p| p.key() == Some(key.as_str()))
        {
            return Err(StoreError::Backend(format!("batch touching {} refused", key)));
        }
        self.inner.batch_write(batch).await
    }

    async fn delete(&self, path: &TreePath) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete(path).await
    }
}

/// A facade over an in-memory store with a frozen clock at [`NOW`].
pub fn memory_frsh() -> (Frsh, MemoryStore, ManualClock) {
    let store = MemoryStore::new();
    let clock = ManualClock::new(NOW);
    let frsh = Frsh::with_clock(
        Arc::new(store.clone()),
        SessionConfig::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (frsh, store, clock)
}

/// A facade over a [`FaultyStore`] with a frozen clock at [`NOW`].
pub fn faulty_frsh() -> (Frsh, Arc<FaultyStore>, ManualClock) {
    let store = FaultyStore::new();
    let clock = ManualClock::new(NOW);
    let frsh = Frsh::with_clock(
        store.clone(),
        SessionConfig::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (frsh, store, clock)
}

/// A frozen clock that cancels `token` on its `cancel_on`-th reading.
#[derive(Debug)]
pub struct CancellingClock {
    pub now: i64,
    pub readings: AtomicUsize,
    pub cancel_on: usize,
    pub token: CancellationToken,
}

impl CancellingClock {
    pub fn new(now: i64, cancel_on: usize, token: CancellationToken) -> Self {
        Self {
            now,
            readings: AtomicUsize::new(0),
            cancel_on,
            token,
        }
    }
}

impl Clock for CancellingClock {
    fn now_millis(&self) -> i64 {
        if self.readings.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_on {
            self.token.cancel();
        }
        self.now
    }
}

/// Path of a session record under the default root.
pub fn record_path(session_id: &str) -> TreePath {
    TreePath::parse(&format!("frsh/sessions/{}", session_id)).unwrap()
}

/// Path of an index entry under the default root.
pub fn entry_path(user_id: &str, session_id: &str) -> TreePath {
    TreePath::parse(&format!("frsh/table/{}/{}", user_id, session_id)).unwrap()
}

/// Seed a session record and its index entry directly, bypassing the facade.
pub async fn seed(store: &dyn TreeStore, user_id: &str, session_id: &str, ttl: i64) {
    let record = record_path(session_id);
    let entry = entry_path(user_id, session_id);
    store
        .write(&record, serde_json::json!({"userId": user_id, "TTL": ttl}))
        .await
        .unwrap();
    store.write(&entry, serde_json::json!(ttl)).await.unwrap();
}

/// Read the mirrored TTL for a session, if present.
pub async fn mirror(store: &dyn TreeStore, user_id: &str, session_id: &str) -> Option<Value> {
    store.read(&entry_path(user_id, session_id)).await.unwrap()
}

/// Read a session record, if present.
pub async fn record(store: &dyn TreeStore, session_id: &str) -> Option<Value> {
    store.read(&record_path(session_id)).await.unwrap()
}
