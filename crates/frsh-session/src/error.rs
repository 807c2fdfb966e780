//! Error types for session operations.

use frsh_store::StoreError;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session record does not exist.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session record exists but its TTL has elapsed.
    #[error("Session expired: {0}")]
    Expired(String),

    /// A duration, concurrency level or identifier was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store did not yield a usable unique id for a new session.
    #[error("Session creation failed: {0}")]
    CreationFailed(String),

    /// The session record was written but its index entry was not.
    #[error("Index write failed for session {session_id} (primary record rolled back: {rolled_back}): {source}")]
    PartialIndexWrite {
        session_id: String,
        rolled_back: bool,
        #[source]
        source: StoreError,
    },

    /// One sweep worker's batch write failed.
    #[error("Sweep worker {worker} failed: {source}")]
    WorkerFailure {
        worker: usize,
        #[source]
        source: StoreError,
    },

    /// A stored value does not have the expected shape.
    #[error("Malformed record at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error from the tree store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
