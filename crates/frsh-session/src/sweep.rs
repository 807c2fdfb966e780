//! Concurrent reclamation of expired sessions.
//!
//! A sweep reads the whole index once, flattens it into candidates, and
//! lets a bounded set of workers drain one shared [`ClaimCursor`]. Each
//! worker judges its claimed candidates against the mirrored TTL, collects
//! the paths of expired ones in a private batch, and commits that batch
//! with a single atomic write once the cursor is exhausted.
//!
//! The index mirror is trusted as the liveness signal. A session extended
//! after the index was read but before its candidate is judged can be
//! reclaimed by mistake; [`SweepOptions::recheck_primary`] narrows that
//! window by re-reading the record first.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frsh_store::{PathBatch, TreeStore};
use futures::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::layout::SessionLayout;

/// An index entry awaiting a liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user_id: String,
    pub session_id: String,
    pub ttl: i64,
}

impl Candidate {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.ttl
    }
}

/// Shared cursor handing out each item exactly once.
///
/// Claiming is a single atomic increment, so any number of workers can
/// drain the same cursor without locks.
#[derive(Debug)]
pub struct ClaimCursor<'a, T> {
    items: &'a [T],
    next: AtomicUsize,
}

impl<'a, T> ClaimCursor<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            next: AtomicUsize::new(0),
        }
    }

    /// Take the next unclaimed item, or `None` once exhausted.
    pub fn claim(&self) -> Option<&'a T> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.items.get(index)
    }

    /// Number of items not yet claimed.
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.next.load(Ordering::Relaxed))
    }
}

/// Parameters for one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Upper bound on concurrent workers. Must be positive.
    pub concurrency: usize,

    /// Re-read each expired candidate's record and skip it if the record is live.
    pub recheck_primary: bool,
}

impl SweepOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            recheck_primary: false,
        }
    }

    pub fn with_recheck_primary(mut self, enabled: bool) -> Self {
        self.recheck_primary = enabled;
        self
    }
}

/// What one worker did during a sweep.
#[derive(Debug)]
pub struct WorkerReport {
    /// Worker index, `0..workers`.
    pub worker: usize,

    /// Candidates this worker took from the cursor.
    pub claimed: usize,

    /// Session ids this worker judged expired and put in its batch.
    pub reclaimed: Vec<String>,

    /// Result of the worker's batch write.
    pub outcome: Result<()>,
}

impl WorkerReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Aggregate result of a sweep. Worker failures are reported, never escalated.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Number of index entries read.
    pub candidates: usize,

    /// One report per worker that ran.
    pub workers: Vec<WorkerReport>,

    /// Whether the sweep was cancelled before the cursor was drained.
    pub cancelled: bool,
}

impl SweepReport {
    /// Candidates claimed across all workers.
    pub fn claimed_count(&self) -> usize {
        self.workers.iter().map(|w| w.claimed).sum()
    }

    /// Sessions removed by workers whose batch committed.
    pub fn reclaimed_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.is_success())
            .map(|w| w.reclaimed.len())
            .sum()
    }

    /// Reports of workers whose batch write failed.
    pub fn failures(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| !w.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.workers.iter().all(WorkerReport::is_success)
    }
}

/// Reclaims sessions whose mirrored TTL has elapsed.
#[derive(Clone)]
pub struct SweepEngine {
    store: Arc<dyn TreeStore>,
    layout: SessionLayout,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SweepEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepEngine")
            .field("layout", &self.layout)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SweepEngine {
    pub fn new(store: Arc<dyn TreeStore>, layout: SessionLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            layout,
            clock,
        }
    }

    /// Run one sweep pass to completion.
    pub async fn sweep(&self, options: SweepOptions) -> Result<SweepReport> {
        self.sweep_with_cancel(options, CancellationToken::new())
            .await
    }

    /// Run one sweep pass, stopping early when `cancel` fires.
    ///
    /// On cancellation workers stop claiming candidates and commit whatever
    /// they have already batched. Committed batches are never rolled back.
    pub async fn sweep_with_cancel(
        &self,
        options: SweepOptions,
        cancel: CancellationToken,
    ) -> Result<SweepReport> {
        if options.concurrency == 0 {
            return Err(Error::InvalidArgument(
                "sweep concurrency must be positive".to_string(),
            ));
        }

        let candidates = self.load_candidates().await?;
        if candidates.is_empty() {
            debug!("Sweep found an empty index");
            return Ok(SweepReport::default());
        }

        let workers = options.concurrency.min(candidates.len());
        info!(
            candidates = candidates.len(),
            workers = workers,
            recheck_primary = options.recheck_primary,
            "Starting expiry sweep"
        );

        let cursor = ClaimCursor::new(&candidates);
        let reports = join_all(
            (0..workers).map(|worker| self.run_worker(worker, &cursor, options, &cancel)),
        )
        .await;

        let report = SweepReport {
            candidates: candidates.len(),
            workers: reports,
            cancelled: cancel.is_cancelled() && cursor.remaining() > 0,
        };

        info!(
            claimed = report.claimed_count(),
            reclaimed = report.reclaimed_count(),
            failed_workers = report.failures().count(),
            cancelled = report.cancelled,
            "Expiry sweep finished"
        );
        Ok(report)
    }

    /// Read the full index and flatten it into candidates.
    ///
    /// Entries that are not `table/{user}/{session} = <integer>` are skipped.
    pub async fn load_candidates(&self) -> Result<Vec<Candidate>> {
        let users = match self.store.read(self.layout.table()).await? {
            None => return Ok(Vec::new()),
            Some(Value::Object(users)) => users,
            Some(other) => {
                warn!(value = %other, "Session index is not a table, nothing to sweep");
                return Ok(Vec::new());
            }
        };

        let mut candidates = Vec::new();
        for (user_id, entries) in users {
            let Value::Object(entries) = entries else {
                warn!(user_id = %user_id, "User index is not a table, skipping");
                continue;
            };
            for (session_id, ttl) in entries {
                match ttl.as_i64() {
                    Some(ttl) => candidates.push(Candidate {
                        user_id: user_id.clone(),
                        session_id,
                        ttl,
                    }),
                    None => {
                        warn!(user_id = %user_id, session_id = %session_id, value = %ttl, "Index entry has no integer TTL, skipping");
                    }
                }
            }
        }
        Ok(candidates)
    }

    async fn run_worker(
        &self,
        worker: usize,
        cursor: &ClaimCursor<'_, Candidate>,
        options: SweepOptions,
        cancel: &CancellationToken,
    ) -> WorkerReport {
        let mut batch = PathBatch::new();
        let mut claimed = 0;
        let mut reclaimed = Vec::new();

        while !cancel.is_cancelled() {
            let Some(candidate) = cursor.claim() else {
                break;
            };
            claimed += 1;
            // Let sibling workers claim between items on a single-threaded executor.
            tokio::task::yield_now().await;

            if !candidate.is_expired_at(self.clock.now_millis()) {
                continue;
            }
            if options.recheck_primary && self.primary_is_live(candidate).await {
                debug!(session_id = %candidate.session_id, "Index TTL is stale, session is live");
                continue;
            }

            match (
                self.layout.session(&candidate.session_id),
                self.layout
                    .index_entry(&candidate.user_id, &candidate.session_id),
            ) {
                (Ok(session), Ok(entry)) => {
                    batch.insert(session, Value::Null);
                    batch.insert(entry, Value::Null);
                    reclaimed.push(candidate.session_id.clone());
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(worker = worker, session_id = %candidate.session_id, error = %e, "Candidate is not addressable, skipping");
                }
            }
        }

        let outcome = if batch.is_empty() {
            Ok(())
        } else {
            self.store
                .batch_write(batch)
                .await
                .map_err(|source| Error::WorkerFailure { worker, source })
        };

        match &outcome {
            Ok(()) => debug!(
                worker = worker,
                claimed = claimed,
                reclaimed = reclaimed.len(),
                "Sweep worker done"
            ),
            Err(e) => warn!(
                worker = worker,
                claimed = claimed,
                batched = reclaimed.len(),
                error = %e,
                "Sweep worker batch failed"
            ),
        }

        WorkerReport {
            worker,
            claimed,
            reclaimed,
            outcome,
        }
    }

    /// Whether the primary record shows the candidate as still live.
    ///
    /// A missing or unreadable record counts as not live, so its index
    /// entry is still reclaimed.
    async fn primary_is_live(&self, candidate: &Candidate) -> bool {
        let Ok(path) = self.layout.session_ttl(&candidate.session_id) else {
            return false;
        };
        match self.store.read(&path).await {
            Ok(Some(ttl)) => ttl
                .as_i64()
                .is_some_and(|ttl| ttl >= self.clock.now_millis()),
            Ok(None) => false,
            Err(e) => {
                warn!(session_id = %candidate.session_id, error = %e, "Recheck read failed, trusting index");
                false
            }
        }
    }
}
