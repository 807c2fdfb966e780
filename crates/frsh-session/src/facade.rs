//! High-level session operations.

use std::sync::Arc;

use frsh_store::TreeStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::layout::SessionLayout;
use crate::record::{Attributes, Session};
use crate::repository::SessionRepository;
use crate::sweep::{SweepEngine, SweepOptions, SweepReport};

/// Session facade: TTL policy, argument checks, and expiry-aware reads on
/// top of [`SessionRepository`] and [`SweepEngine`].
///
/// Expired sessions are reclaimed two ways that compose safely: lazily when
/// [`Frsh::verify_session`] reads one, and in bulk by [`Frsh::sweep_expired`].
#[derive(Debug, Clone)]
pub struct Frsh {
    repository: SessionRepository,
    sweeper: SweepEngine,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl Frsh {
    /// Create a facade over `store` using the system clock.
    ///
    /// Fails if the configured root cannot hold the session and index spaces.
    pub fn new(store: Arc<dyn TreeStore>, config: SessionConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a facade with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn TreeStore>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let layout = SessionLayout::new(&config.root)?;
        Ok(Self {
            repository: SessionRepository::new(Arc::clone(&store), layout.clone(), Arc::clone(&clock)),
            sweeper: SweepEngine::new(store, layout, Arc::clone(&clock)),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    /// Create a session for `user_id` expiring after the configured lifetime.
    pub async fn create_session(
        &self,
        user_id: &str,
        attributes: Attributes,
    ) -> Result<(String, Session)> {
        let ttl = self
            .clock
            .now_millis()
            .saturating_add(self.config.expiry_millis());
        let mut session = Session::new(user_id, ttl, attributes);

        let id = self.repository.create(&session).await?;
        session.id = id.clone();
        Ok((id, session))
    }

    /// Return the session if it exists and is live.
    ///
    /// An expired session is removed on the way out (best effort) and
    /// reported as absent, as is an id that cannot name a session. A record
    /// that no longer decodes as a session is treated the same as an expired one.
    pub async fn verify_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session = match self.repository.get(session_id).await {
            Ok(session) => session,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(Error::InvalidArgument(reason)) => {
                debug!(session_id = %session_id, reason = %reason, "Rejected unaddressable session id");
                return Ok(None);
            }
            Err(e @ Error::Malformed { .. }) => {
                warn!(session_id = %session_id, error = %e, "Discarding malformed session record");
                if let Err(e) = self.repository.remove(session_id).await {
                    warn!(session_id = %session_id, error = %e, "Failed to remove malformed session");
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if session.is_expired_at(self.clock.now_millis()) {
            debug!(session_id = %session_id, "Session expired, reclaiming on read");
            if let Err(e) = self.repository.remove(session_id).await {
                warn!(session_id = %session_id, error = %e, "Failed to reclaim expired session");
            }
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Live sessions of a user, most time remaining first.
    pub async fn list_user_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let now = self.clock.now_millis();
        let mut sessions: Vec<Session> = self
            .repository
            .list_by_user(user_id)
            .await?
            .into_iter()
            .filter(|s| !s.is_expired_at(now))
            .collect();
        sessions.sort_by(|a, b| b.ttl.cmp(&a.ttl));
        Ok(sessions)
    }

    /// Add `duration_ms` to a live session's TTL. Returns the new TTL.
    pub async fn extend_session(&self, session_id: &str, duration_ms: i64) -> Result<i64> {
        if duration_ms <= 0 {
            return Err(Error::InvalidArgument(format!(
                "extension must be positive, got {}ms",
                duration_ms
            )));
        }
        self.repository.extend(session_id, duration_ms).await
    }

    /// Merge attributes into a live session.
    pub async fn update_session(&self, session_id: &str, patch: Attributes) -> Result<Session> {
        self.repository.update_attributes(session_id, patch).await
    }

    /// Delete one session. Deleting an absent session succeeds.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.repository.remove(session_id).await
    }

    /// Delete every session of a user. Returns how many were addressed.
    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<usize> {
        self.repository.remove_by_user(user_id).await
    }

    /// Reclaim expired sessions with up to `concurrency` workers.
    pub async fn sweep_expired(&self, concurrency: usize) -> Result<SweepReport> {
        self.sweep_expired_with_cancel(concurrency, CancellationToken::new())
            .await
    }

    /// Reclaim expired sessions using the configured concurrency.
    pub async fn sweep_expired_default(&self) -> Result<SweepReport> {
        self.sweep_expired(self.config.sweep_concurrency).await
    }

    /// Reclaim expired sessions, stopping early when `cancel` fires.
    pub async fn sweep_expired_with_cancel(
        &self,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<SweepReport> {
        if concurrency == 0 {
            return Err(Error::InvalidArgument(
                "sweep concurrency must be positive".to_string(),
            ));
        }
        let options =
            SweepOptions::new(concurrency).with_recheck_primary(self.config.recheck_primary);
        self.sweeper.sweep_with_cancel(options, cancel).await
    }
}
