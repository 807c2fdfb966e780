//! Session records and the per-user index.
//!
//! Every session lives at `sessions/{id}` and is mirrored by an index entry
//! `table/{userId}/{id} = TTL`. Mutations after creation touch both paths in
//! one atomic batch write, so readers never see a record and its mirror
//! disagree because of a half-applied call.

use std::sync::Arc;

use frsh_store::{PathBatch, StoreError, TreeStore, validate_segment};
use futures::future::join_all;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::layout::{SessionLayout, TTL_FIELD, USER_FIELD};
use crate::record::{Attributes, Session, check_attribute_keys, strip_reserved};

/// CRUD over session records with index consistency.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn TreeStore>,
    layout: SessionLayout,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository")
            .field("layout", &self.layout)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SessionRepository {
    pub fn new(store: Arc<dyn TreeStore>, layout: SessionLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            layout,
            clock,
        }
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Store a new session and its index entry, returning the generated id.
    ///
    /// The record is pushed first, then the mirror is set with a keyed write.
    /// If the mirror write fails the record is deleted again (best effort)
    /// and [`Error::PartialIndexWrite`] reports whether that worked.
    pub async fn create(&self, session: &Session) -> Result<String> {
        let user_table = self.layout.user_table(&session.user_id)?;
        check_attribute_keys(&session.attributes)?;
        let body = session.to_value()?;

        let id = match self.store.push(self.layout.sessions(), body).await {
            Ok(id) => id,
            Err(StoreError::AlreadyExists(key)) => {
                return Err(Error::CreationFailed(format!("generated key collided: {}", key)));
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(reason) = validate_segment(&id) {
            return Err(Error::CreationFailed(format!(
                "store returned unusable id '{}': {}",
                id, reason
            )));
        }

        let primary = self.layout.session(&id)?;
        let entry = user_table.child(&id)?;
        if let Err(source) = self.store.write(&entry, json!(session.ttl)).await {
            warn!(session_id = %id, user_id = %session.user_id, error = %source, "Index write failed after session record was stored");
            let rolled_back = match self.store.delete(&primary).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Could not roll back orphaned session record");
                    false
                }
            };
            return Err(Error::PartialIndexWrite {
                session_id: id,
                rolled_back,
                source,
            });
        }

        debug!(session_id = %id, user_id = %session.user_id, ttl = session.ttl, "Session created");
        Ok(id)
    }

    /// Read a session record. Does not look at the index or the TTL.
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        let path = self.layout.session(session_id)?;
        match self.store.read(&path).await? {
            Some(value) => Session::from_value(session_id, value, &path.to_string()),
            None => Err(Error::NotFound(session_id.to_string())),
        }
    }

    /// Session ids listed under a user in the index.
    pub async fn list_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let path = self.layout.user_table(user_id)?;
        match self.store.read(&path).await? {
            None => Ok(Vec::new()),
            Some(Value::Object(entries)) => Ok(entries.keys().cloned().collect()),
            Some(other) => {
                warn!(user_id = %user_id, value = %other, "User index is not a table, ignoring");
                Ok(Vec::new())
            }
        }
    }

    /// All session records a user's index points at.
    ///
    /// Records are read concurrently. Ones that are gone or unreadable are
    /// left out rather than failing the listing.
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let ids = self.list_ids(user_id).await?;
        let outcomes = join_all(ids.iter().map(|id| self.get(id))).await;

        let sessions = outcomes
            .into_iter()
            .zip(&ids)
            .filter_map(|(outcome, id)| match outcome {
                Ok(session) => Some(session),
                Err(Error::NotFound(_)) => {
                    debug!(session_id = %id, user_id = %user_id, "Indexed session has no record");
                    None
                }
                Err(e) => {
                    warn!(session_id = %id, user_id = %user_id, error = %e, "Skipping unreadable session");
                    None
                }
            })
            .collect();
        Ok(sessions)
    }

    /// Push a live session's TTL forward by `extension` milliseconds.
    ///
    /// The record's TTL is raised with a compare-and-swap that only succeeds
    /// while the record exists and is live, then the index mirror is moved to
    /// match. A session deleted concurrently is never recreated. Returns the
    /// new TTL.
    pub async fn extend(&self, session_id: &str, extension: i64) -> Result<i64> {
        if extension <= 0 {
            return Err(Error::InvalidArgument(format!(
                "extension must be positive, got {}",
                extension
            )));
        }

        let path = self.layout.session(session_id)?;
        let now = self.clock.now_millis();
        let tx = self
            .store
            .atomic_update(
                &path,
                Box::new(move |current| {
                    let Value::Object(body) = current? else {
                        return None;
                    };
                    body.get(USER_FIELD).and_then(Value::as_str)?;
                    let ttl = body.get(TTL_FIELD).and_then(Value::as_i64)?;
                    if now > ttl {
                        return None;
                    }
                    let extended = ttl.checked_add(extension)?;
                    let mut body = body.clone();
                    body.insert(TTL_FIELD.to_string(), json!(extended));
                    Some(Value::Object(body))
                }),
            )
            .await?;

        let Some(snapshot) = tx.snapshot else {
            return Err(Error::NotFound(session_id.to_string()));
        };
        let session = Session::from_value(session_id, snapshot, &path.to_string())?;
        if !tx.committed {
            if session.is_expired_at(now) {
                return Err(Error::Expired(session_id.to_string()));
            }
            return Err(Error::InvalidArgument(format!(
                "extension {} overflows TTL",
                extension
            )));
        }

        self.mirror_ttl(&session).await?;
        debug!(session_id = %session_id, new_ttl = session.ttl, "Session extended");
        Ok(session.ttl)
    }

    /// Move an existing index entry to the record's TTL.
    ///
    /// The entry is only replaced while present. If it vanished, the record is
    /// re-read: a record that is gone too means the session was deleted in the
    /// meantime, otherwise the entry is restored.
    async fn mirror_ttl(&self, session: &Session) -> Result<()> {
        let entry = self.layout.index_entry(&session.user_id, &session.id)?;
        let ttl = session.ttl;
        let tx = self
            .store
            .atomic_update(
                &entry,
                Box::new(move |current| {
                    current?;
                    Some(json!(ttl))
                }),
            )
            .await?;
        if tx.committed {
            return Ok(());
        }

        match self.store.read(&self.layout.session(&session.id)?).await? {
            None => {
                debug!(session_id = %session.id, "Session deleted while extending");
                Err(Error::NotFound(session.id.clone()))
            }
            Some(_) => {
                warn!(session_id = %session.id, user_id = %session.user_id, "Index entry missing for live session, restoring");
                self.store.write(&entry, json!(ttl)).await?;
                Ok(())
            }
        }
    }

    /// Merge `patch` into a live session's attributes.
    ///
    /// Runs as a compare-and-swap on the record. A `null` in the patch removes
    /// that attribute. `userId` and `TTL` cannot be changed this way.
    pub async fn update_attributes(&self, session_id: &str, patch: Attributes) -> Result<Session> {
        let path = self.layout.session(session_id)?;
        let patch = strip_reserved(patch);
        check_attribute_keys(&patch)?;
        let now = self.clock.now_millis();

        let tx = self
            .store
            .atomic_update(
                &path,
                Box::new(move |current| {
                    let Value::Object(body) = current? else {
                        return None;
                    };
                    let ttl = body.get(TTL_FIELD).and_then(Value::as_i64)?;
                    if now > ttl {
                        return None;
                    }
                    let mut body = body.clone();
                    for (key, value) in &patch {
                        if value.is_null() {
                            body.remove(key);
                        } else {
                            body.insert(key.clone(), value.clone());
                        }
                    }
                    Some(Value::Object(body))
                }),
            )
            .await?;

        let Some(snapshot) = tx.snapshot else {
            return Err(Error::NotFound(session_id.to_string()));
        };
        let session = Session::from_value(session_id, snapshot, &path.to_string())?;
        if !tx.committed {
            return Err(Error::Expired(session_id.to_string()));
        }

        debug!(session_id = %session_id, "Session attributes updated");
        Ok(session)
    }

    /// Delete a session and its index entry. Absent sessions are a no-op.
    ///
    /// Works from the raw record, so a body that no longer decodes as a
    /// session is still removed. Its index entry goes with it when the owner
    /// can be read from the body.
    pub async fn remove(&self, session_id: &str) -> Result<()> {
        let path = self.layout.session(session_id)?;
        let Some(body) = self.store.read(&path).await? else {
            debug!(session_id = %session_id, "Session already gone");
            return Ok(());
        };

        let mut batch = PathBatch::new();
        batch.insert(path, Value::Null);
        let owner = body.get(USER_FIELD).and_then(Value::as_str);
        match owner.map(|user_id| self.layout.index_entry(user_id, session_id)) {
            Some(Ok(entry)) => {
                batch.insert(entry, Value::Null);
            }
            Some(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Session owner is not addressable, removing record only");
            }
            None => {
                warn!(session_id = %session_id, "Session record has no owner, removing record only");
            }
        }
        self.store.batch_write(batch).await?;

        debug!(session_id = %session_id, user_id = owner.unwrap_or_default(), "Session removed");
        Ok(())
    }

    /// Delete every session indexed under a user, plus the user's index subtree.
    ///
    /// Returns the number of session records addressed.
    pub async fn remove_by_user(&self, user_id: &str) -> Result<usize> {
        let ids = self.list_ids(user_id).await?;

        let mut batch = PathBatch::new();
        for id in &ids {
            batch.insert(self.layout.session(id)?, Value::Null);
        }
        batch.insert(self.layout.user_table(user_id)?, Value::Null);
        self.store.batch_write(batch).await?;

        info!(user_id = %user_id, sessions = ids.len(), "Removed all sessions for user");
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use frsh_store::{MemoryStore, TreePath};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn setup() -> (SessionRepository, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(NOW);
        let layout = SessionLayout::new(&TreePath::parse("frsh").unwrap()).unwrap();
        let repo = SessionRepository::new(Arc::new(store.clone()), layout, Arc::new(clock.clone()));
        (repo, store, clock)
    }

    async fn mirror(store: &MemoryStore, user: &str, id: &str) -> Option<Value> {
        store
            .read(&TreePath::parse(&format!("frsh/table/{}/{}", user, id)).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_writes_record_and_mirror() {
        let (repo, store, _) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 1_000, Attributes::new()))
            .await
            .unwrap();

        let session = repo.get(&id).await.unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.ttl, NOW + 1_000);
        assert_eq!(mirror(&store, "u1", &id).await, Some(json!(NOW + 1_000)));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_user_before_writing() {
        let (repo, store, _) = setup();
        let err = repo
            .create(&Session::new("bad.user", NOW, Attributes::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_get_ignores_ttl() {
        let (repo, _, clock) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 10, Attributes::new()))
            .await
            .unwrap();

        clock.advance(1_000);
        assert!(repo.get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (repo, _, _) = setup();
        assert!(matches!(repo.get("nope").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_user_drops_dangling_entries() {
        let (repo, store, _) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 10, Attributes::new()))
            .await
            .unwrap();
        store
            .write(&TreePath::parse("frsh/table/u1/ghost").unwrap(), json!(NOW + 10))
            .await
            .unwrap();
        store
            .write(&TreePath::parse("frsh/sessions/broken").unwrap(), json!("garbage"))
            .await
            .unwrap();
        store
            .write(&TreePath::parse("frsh/table/u1/broken").unwrap(), json!(NOW + 10))
            .await
            .unwrap();

        let sessions = repo.list_by_user("u1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
    }

    #[tokio::test]
    async fn test_extend_updates_both_paths() {
        let (repo, store, _) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 100, Attributes::new()))
            .await
            .unwrap();

        let ttl = repo.extend(&id, 50).await.unwrap();
        assert_eq!(ttl, NOW + 150);
        assert_eq!(repo.get(&id).await.unwrap().ttl, NOW + 150);
        assert_eq!(mirror(&store, "u1", &id).await, Some(json!(NOW + 150)));
    }

    #[tokio::test]
    async fn test_extend_expired_rejected() {
        let (repo, _, clock) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 100, Attributes::new()))
            .await
            .unwrap();

        clock.advance(101);
        assert!(matches!(repo.extend(&id, 50).await, Err(Error::Expired(_))));
        assert_eq!(repo.get(&id).await.unwrap().ttl, NOW + 100);
    }

    #[tokio::test]
    async fn test_extend_missing() {
        let (repo, _, _) = setup();
        assert!(matches!(repo.extend("nope", 50).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_attributes_merges() {
        let (repo, _, _) = setup();
        let mut attrs = Attributes::new();
        attrs.insert("theme".into(), json!("dark"));
        attrs.insert("lang".into(), json!("en"));
        let id = repo
            .create(&Session::new("u1", NOW + 100, attrs))
            .await
            .unwrap();

        let mut patch = Attributes::new();
        patch.insert("lang".into(), json!("fr"));
        patch.insert("theme".into(), Value::Null);
        patch.insert("TTL".into(), json!(0));
        let session = repo.update_attributes(&id, patch).await.unwrap();

        assert_eq!(session.ttl, NOW + 100);
        assert_eq!(session.attributes.get("lang"), Some(&json!("fr")));
        assert!(!session.attributes.contains_key("theme"));
    }

    #[tokio::test]
    async fn test_update_attributes_expired_and_missing() {
        let (repo, _, clock) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 100, Attributes::new()))
            .await
            .unwrap();

        assert!(matches!(
            repo.update_attributes("nope", Attributes::new()).await,
            Err(Error::NotFound(_))
        ));

        clock.advance(500);
        assert!(matches!(
            repo.update_attributes(&id, Attributes::new()).await,
            Err(Error::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (repo, store, _) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 100, Attributes::new()))
            .await
            .unwrap();

        repo.remove(&id).await.unwrap();
        repo.remove(&id).await.unwrap();
        repo.remove("never-created").await.unwrap();

        assert!(matches!(repo.get(&id).await, Err(Error::NotFound(_))));
        assert_eq!(mirror(&store, "u1", &id).await, None);
    }

    #[tokio::test]
    async fn test_remove_by_user_leaves_other_users() {
        let (repo, store, _) = setup();
        for _ in 0..3 {
            repo.create(&Session::new("u1", NOW + 100, Attributes::new()))
                .await
                .unwrap();
        }
        let kept = repo
            .create(&Session::new("u2", NOW + 100, Attributes::new()))
            .await
            .unwrap();

        assert_eq!(repo.remove_by_user("u1").await.unwrap(), 3);

        assert!(repo.list_ids("u1").await.unwrap().is_empty());
        assert_eq!(
            store
                .read(&TreePath::parse("frsh/sessions").unwrap())
                .await
                .unwrap()
                .unwrap()
                .as_object()
                .unwrap()
                .len(),
            1
        );
        assert!(repo.get(&kept).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_by_unknown_user() {
        let (repo, _, _) = setup();
        assert_eq!(repo.remove_by_user("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_clears_undecodable_records() {
        let (repo, store, _) = setup();
        store
            .write(&TreePath::parse("frsh/sessions/orphan").unwrap(), json!({"TTL": NOW + 10}))
            .await
            .unwrap();
        store
            .write(
                &TreePath::parse("frsh/sessions/ownerless").unwrap(),
                json!({"userId": "u1", "TTL": "later"}),
            )
            .await
            .unwrap();
        store
            .write(&TreePath::parse("frsh/table/u1/ownerless").unwrap(), json!(NOW + 10))
            .await
            .unwrap();

        repo.remove("orphan").await.unwrap();
        repo.remove("ownerless").await.unwrap();

        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_extend_leaves_other_fields_alone() {
        let (repo, store, _) = setup();
        let mut attrs = Attributes::new();
        attrs.insert("device".into(), json!("phone"));
        let id = repo.create(&Session::new("u1", NOW + 100, attrs)).await.unwrap();

        repo.extend(&id, 1).await.unwrap();

        let session = repo.get(&id).await.unwrap();
        assert_eq!(session.attributes["device"], json!("phone"));
        assert_eq!(mirror(&store, "u1", &id).await, Some(json!(NOW + 101)));
    }

    #[tokio::test]
    async fn test_extend_overflow_rejected() {
        let (repo, _, _) = setup();
        let id = repo
            .create(&Session::new("u1", i64::MAX - 1, Attributes::new()))
            .await
            .unwrap();

        assert!(matches!(
            repo.extend(&id, 5).await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(repo.get(&id).await.unwrap().ttl, i64::MAX - 1);
    }

    #[tokio::test]
    async fn test_extend_restores_missing_index_entry() {
        let (repo, store, _) = setup();
        let id = repo
            .create(&Session::new("u1", NOW + 100, Attributes::new()))
            .await
            .unwrap();
        store
            .delete(&TreePath::parse(&format!("frsh/table/u1/{}", id)).unwrap())
            .await
            .unwrap();

        assert_eq!(repo.extend(&id, 10).await.unwrap(), NOW + 110);
        assert_eq!(mirror(&store, "u1", &id).await, Some(json!(NOW + 110)));
    }
}
