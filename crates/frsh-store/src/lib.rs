//! Hierarchical tree-store contract for frsh.
//!
//! This crate defines the boundary between session bookkeeping and the
//! backend that actually holds the data:
//! - [`TreePath`] addresses nodes with validated `/`-separated segments
//! - [`TreeStore`] is the adaptor trait (read, write, push, compare-and-swap,
//!   atomic multi-path write, delete)
//! - [`MemoryStore`] is an in-process implementation of the full contract
//!
//! # Example
//!
//! ```rust,ignore
//! use frsh_store::{MemoryStore, TreePath, TreeStore};
//!
//! let store = MemoryStore::new();
//! let path = TreePath::parse("frsh/sessions")?;
//! let id = store.push(&path, serde_json::json!({"userId": "u1"})).await?;
//! ```

mod error;
mod memory;
mod path;
mod push_id;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use path::{TreePath, validate_segment};
pub use push_id::{PUSH_ID_LEN, PushIdGenerator};
pub use store::{PathBatch, Transaction, TreeStore, UpdateFn};
