//! The [`JobStore`] trait — the contract every storage backend must fulfil.
//!
//! The queue engine (`engine` crate) holds this trait as `Arc<dyn JobStore>`
//! rather than calling a concrete store type directly. Two implementations
//! live alongside it: [`crate::SqliteStore`], the production backend, and
//! [`crate::MemoryStore`], an in-process fake used by the engine's property
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{JobRow, NewJob, StateCounts, WorkerRow};

/// The outcome a failed execution attempt resolves to, decided by the
/// queue engine's backoff policy (`engine::backoff`) and handed to the
/// store as a single atomic mutation.
#[derive(Debug, Clone)]
pub enum FailureOutcome {
    /// `attempts' > max_retries` — the job is moved to `dead`.
    Dead { attempts: i64, error_text: String },
    /// The job is rescheduled with the given `available_at`.
    Retry {
        attempts: i64,
        available_at: DateTime<Utc>,
        error_text: String,
    },
}

/// Optional filter for [`JobStore::list_jobs`].
pub type StateFilter = Option<crate::models::JobState>;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job. Returns only after durable commit.
    async fn enqueue(&self, spec: NewJob, now: DateTime<Utc>) -> Result<JobRow, StoreError>;

    /// Atomically select and claim the single highest-priority eligible
    /// job, ordered by `(priority ASC, created_at ASC)`. Returns `None` if
    /// no job is eligible.
    async fn claim(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<JobRow>, StoreError>;

    /// Unconditionally transition `processing -> completed`. `attempts` is
    /// the caller's post-increment count (this execution counts, success or
    /// not), mirroring the `attempts` the caller passes through
    /// [`FailureOutcome`] on the failure path.
    async fn finalize_success(
        &self,
        job_id: &str,
        attempts: i64,
        output: String,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Apply a failure outcome already decided by the caller (the queue
    /// engine), atomically.
    async fn finalize_failure(
        &self,
        job_id: &str,
        outcome: FailureOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Transition `dead -> pending`. Returns `Ok(false)` if the job was not
    /// in `dead` (the engine maps that to `InvalidTransition`).
    async fn dlq_retry(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Fetch a single job by id.
    async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>, StoreError>;

    /// List jobs, optionally filtered by state, ordered by `created_at ASC`.
    async fn list_jobs(&self, state: StateFilter) -> Result<Vec<JobRow>, StoreError>;

    /// The twenty most recently updated jobs, newest first (dashboard view).
    async fn recent_jobs(&self, limit: i64) -> Result<Vec<JobRow>, StoreError>;

    /// Per-state counts plus total.
    async fn counts(&self) -> Result<StateCounts, StoreError>;

    /// Upsert a worker's heartbeat row.
    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        pid: u32,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// All known worker registrations.
    async fn list_workers(&self) -> Result<Vec<WorkerRow>, StoreError>;

    /// Read a config value, or `None` if the key has never been set.
    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Upsert a config value.
    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
