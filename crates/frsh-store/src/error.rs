//! Error types for tree store operations.

/// Error type for tree store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A path or path segment is not addressable in the tree.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Two paths in one batch write address overlapping nodes.
    #[error("Overlapping paths in batch write: '{0}' and '{1}'")]
    OverlappingPaths(String, String),

    /// A generated child key already exists.
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// The backend failed to perform the operation.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A value could not be converted to or from the tree representation.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tree store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
