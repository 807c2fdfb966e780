//! In-process tree store.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::path::TreePath;
use crate::push_id::PushIdGenerator;
use crate::store::{PathBatch, Transaction, TreeStore, UpdateFn};

/// A [`TreeStore`] holding the whole tree in memory.
///
/// Every call runs under a single write-lock acquisition, so batch writes and
/// compare-and-swap updates are atomic with respect to all other calls.
/// Cloning shares the underlying tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: Arc<RwLock<Value>>,
    ids: Arc<PushIdGenerator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_snapshot(Value::Object(Map::new()))
    }

    /// Create a store seeded with an exported tree.
    ///
    /// Nulls and empty objects in the snapshot are dropped.
    pub fn from_snapshot(snapshot: Value) -> Self {
        let tree = match normalize(snapshot) {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            tree: Arc::new(RwLock::new(tree)),
            ids: Arc::new(PushIdGenerator::new()),
        }
    }

    /// Export the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.read().clone()
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn read(&self, path: &TreePath) -> Result<Option<Value>> {
        let tree = self.tree.read();
        Ok(get_at(&tree, path.segments()).cloned())
    }

    async fn write(&self, path: &TreePath, value: Value) -> Result<()> {
        let mut tree = self.tree.write();
        trace!(path = %path, "write");
        store_at(&mut tree, path.segments(), value);
        Ok(())
    }

    async fn push(&self, path: &TreePath, value: Value) -> Result<String> {
        let id = self.ids.next_id();
        let child = path.child(&id)?;

        let mut tree = self.tree.write();
        if get_at(&tree, child.segments()).is_some() {
            return Err(StoreError::AlreadyExists(child.to_string()));
        }
        trace!(path = %child, "push");
        store_at(&mut tree, child.segments(), value);
        Ok(id)
    }

    async fn atomic_update(&self, path: &TreePath, mut update: UpdateFn) -> Result<Transaction> {
        let mut tree = self.tree.write();
        let current = get_at(&tree, path.segments()).cloned();

        match update(current.as_ref()) {
            None => Ok(Transaction {
                committed: false,
                snapshot: current,
            }),
            Some(value) => {
                store_at(&mut tree, path.segments(), value);
                Ok(Transaction {
                    committed: true,
                    snapshot: get_at(&tree, path.segments()).cloned(),
                })
            }
        }
    }

    async fn batch_write(&self, batch: PathBatch) -> Result<()> {
        check_disjoint(&batch)?;

        let mut tree = self.tree.write();
        trace!(paths = batch.len(), "batch write");
        for (path, value) in batch {
            store_at(&mut tree, path.segments(), value);
        }
        Ok(())
    }

    async fn delete(&self, path: &TreePath) -> Result<()> {
        let mut tree = self.tree.write();
        store_at(&mut tree, path.segments(), Value::Null);
        Ok(())
    }
}

/// Reject batches where one path is an ancestor of another.
///
/// Batch keys are sorted, and every descendant of a path sorts directly
/// after it, so comparing neighbours is enough.
fn check_disjoint(batch: &PathBatch) -> Result<()> {
    let paths: Vec<&TreePath> = batch.keys().collect();
    for pair in paths.windows(2) {
        if pair[0].is_ancestor_of(pair[1]) {
            return Err(StoreError::OverlappingPaths(
                pair[0].to_string(),
                pair[1].to_string(),
            ));
        }
    }
    Ok(())
}

fn get_at<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = node;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if is_vacant(current) { None } else { Some(current) }
}

/// Set or (for null/empty values) remove the node at `segments`.
fn store_at(root: &mut Value, segments: &[String], value: Value) {
    let value = normalize(value);
    if segments.is_empty() {
        *root = match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        return;
    }
    if value.is_null() {
        remove_at(root, segments);
    } else {
        set_at(root, segments, value);
    }
}

fn set_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

fn remove_at(node: &mut Value, segments: &[String]) {
    let Value::Object(map) = node else { return };
    match segments {
        [] => {}
        [last] => {
            map.remove(last);
        }
        [first, rest @ ..] => {
            if let Some(child) = map.get_mut(first) {
                remove_at(child, rest);
                if is_vacant(child) {
                    map.remove(first);
                }
            }
        }
    }
}

/// Strip nulls and empty objects; a value that ends up empty becomes null.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() { Value::Null } else { Value::Object(map) }
        }
        other => other,
    }
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> TreePath {
        TreePath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let store = MemoryStore::new();
        store.write(&path("a/b/c"), json!(5)).await.unwrap();

        assert_eq!(store.read(&path("a/b/c")).await.unwrap(), Some(json!(5)));
        assert_eq!(
            store.read(&path("a")).await.unwrap(),
            Some(json!({"b": {"c": 5}}))
        );
        assert_eq!(store.read(&path("a/x")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_null_write_prunes_empty_parents() {
        let store = MemoryStore::new();
        store.write(&path("a/b/c"), json!(1)).await.unwrap();
        store.write(&path("a/b/c"), Value::Null).await.unwrap();

        assert_eq!(store.read(&path("a")).await.unwrap(), None);
        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryStore::new();
        store.delete(&path("nothing/here")).await.unwrap();
        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_push_generates_distinct_keys() {
        let store = MemoryStore::new();
        let a = store.push(&path("items"), json!({"n": 1})).await.unwrap();
        let b = store.push(&path("items"), json!({"n": 2})).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(
            store.read(&path("items")).await.unwrap().unwrap()[&a],
            json!({"n": 1})
        );
    }

    #[tokio::test]
    async fn test_batch_write_applies_all() {
        let store = MemoryStore::from_snapshot(json!({"x": {"a": 1, "b": 2}, "y": 3}));
        let mut batch = PathBatch::new();
        batch.insert(path("x/a"), Value::Null);
        batch.insert(path("y"), json!(4));
        batch.insert(path("z/w"), json!("new"));
        store.batch_write(batch).await.unwrap();

        assert_eq!(
            store.snapshot(),
            json!({"x": {"b": 2}, "y": 4, "z": {"w": "new"}})
        );
    }

    #[tokio::test]
    async fn test_batch_write_rejects_overlap_without_applying() {
        let store = MemoryStore::from_snapshot(json!({"x": {"a": 1}}));
        let mut batch = PathBatch::new();
        batch.insert(path("q"), json!(1));
        batch.insert(path("x"), Value::Null);
        batch.insert(path("x/a"), json!(2));

        let err = store.batch_write(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::OverlappingPaths(_, _)));
        assert_eq!(store.snapshot(), json!({"x": {"a": 1}}));
    }

    #[tokio::test]
    async fn test_atomic_update_commit_and_abort() {
        let store = MemoryStore::from_snapshot(json!({"n": 1}));

        let tx = store
            .atomic_update(
                &path("n"),
                Box::new(|current| current.and_then(Value::as_i64).map(|n| json!(n + 1))),
            )
            .await
            .unwrap();
        assert!(tx.committed);
        assert_eq!(tx.snapshot, Some(json!(2)));

        let tx = store
            .atomic_update(&path("missing"), Box::new(|current| current.cloned()))
            .await
            .unwrap();
        assert!(!tx.committed);
        assert_eq!(tx.snapshot, None);
    }

    #[tokio::test]
    async fn test_concurrent_atomic_updates_do_not_lose_increments() {
        let store = MemoryStore::new();
        let updates = (0..100).map(|_| {
            let store = store.clone();
            async move {
                store
                    .atomic_update(
                        &path("counter"),
                        Box::new(|current| {
                            let n = current.and_then(Value::as_i64).unwrap_or(0);
                            Some(json!(n + 1))
                        }),
                    )
                    .await
                    .unwrap()
            }
        });
        futures::future::join_all(updates).await;

        assert_eq!(store.read(&path("counter")).await.unwrap(), Some(json!(100)));
    }

    #[test]
    fn test_snapshot_drops_nulls() {
        let store = MemoryStore::from_snapshot(json!({"a": null, "b": {}, "c": {"d": 1}}));
        assert_eq!(store.snapshot(), json!({"c": {"d": 1}}));
    }
}
