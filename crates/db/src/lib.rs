//! `db` crate — pure persistence layer.
//!
//! Owns the `jobs`/`workers`/`kv` schema and exposes it behind the
//! [`JobStore`] trait. No retry/backoff policy lives here — that's the
//! `engine` crate's job; this crate only guarantees atomic claims and
//! durable writes.

pub mod error;
pub mod memory_store;
pub mod models;
pub mod sqlite_store;
pub mod store;

pub use error::StoreError;
pub use memory_store::MemoryStore;
pub use models::{JobRow, JobState, NewJob, StateCounts, WorkerRow};
pub use sqlite_store::SqliteStore;
pub use store::{FailureOutcome, JobStore, StateFilter};
