//! Ephemeral session records with a per-user TTL index.
//!
//! This crate keeps session records in a hierarchical tree store together
//! with a denormalized index of `userId -> sessionId -> TTL`:
//! - [`SessionRepository`] creates, reads, extends and deletes records while
//!   keeping the index mirror consistent through atomic multi-path writes
//! - [`SweepEngine`] reclaims expired sessions with a bounded pool of workers
//!   draining one shared cursor
//! - [`Frsh`] is the facade applying the TTL policy on top of both
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use frsh_session::{Attributes, Frsh, SessionConfig};
//! use frsh_store::MemoryStore;
//!
//! let frsh = Frsh::new(Arc::new(MemoryStore::new()), SessionConfig::default())?;
//! let (id, _) = frsh.create_session("user-1", Attributes::new()).await?;
//! assert!(frsh.verify_session(&id).await?.is_some());
//! ```

mod clock;
mod config;
mod error;
mod facade;
mod layout;
mod record;
mod repository;
mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_EXPIRY, DEFAULT_ROOT, DEFAULT_SWEEP_CONCURRENCY, SessionConfig};
pub use error::{Error, Result};
pub use facade::Frsh;
pub use layout::{SessionLayout, TTL_FIELD, USER_FIELD};
pub use record::{Attributes, Session};
pub use repository::SessionRepository;
pub use sweep::{Candidate, ClaimCursor, SweepEngine, SweepOptions, SweepReport, WorkerReport};

pub use tokio_util::sync::CancellationToken;
