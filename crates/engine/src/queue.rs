//! `QueueEngine` — the orchestrator owning the job state machine.
//!
//! Thin by design: it holds a store and a clock and translates the four
//! public operations into store calls plus the backoff policy in
//! [`crate::backoff`]. No retry/backoff logic leaks into `db`.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use db::{FailureOutcome, JobRow, JobState, JobStore, NewJob, StateCounts, StateFilter, WorkerRow};

use crate::backoff::delay_for_attempt;
use crate::clock::Clock;
use crate::error::EngineError;

const DEFAULT_BACKOFF_BASE: u32 = 2;

/// Orchestrates the queue's state machine over a [`JobStore`] trait object,
/// so a CLI binary can hold one concrete `QueueEngine` regardless of which
/// store backend it was built against.
pub struct QueueEngine {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Insert a new `pending` job. Returns only after durable commit.
    #[instrument(skip(self, spec))]
    pub async fn enqueue(&self, spec: NewJob) -> Result<JobRow, EngineError> {
        if spec.command.trim().is_empty() {
            return Err(EngineError::BadInput("command must not be empty".into()));
        }
        let now = self.clock.now();
        Ok(self.store.enqueue(spec, now).await?)
    }

    /// Atomically select and claim the single highest-priority eligible
    /// job, ordered by `(priority ASC, created_at ASC)`.
    #[instrument(skip(self), fields(worker_id = worker_id))]
    pub async fn claim(&self, worker_id: &str) -> Result<Option<JobRow>, EngineError> {
        let now = self.clock.now();
        Ok(self.store.claim(worker_id, now).await?)
    }

    /// Unconditionally transition `processing -> completed`, clearing
    /// `worker_id` so a completed job never appears to still belong to a
    /// worker. `attempts` counts this execution (success or failure both
    /// count, per `attempts`'s definition as completed execution attempts),
    /// so the stored value becomes `job.attempts + 1`.
    #[instrument(skip(self, job, output), fields(job_id = %job.id))]
    pub async fn finalize_success(&self, job: &JobRow, output: String) -> Result<(), EngineError> {
        let now = self.clock.now();
        let attempts = job.attempts + 1;
        Ok(self.store.finalize_success(&job.id, attempts, output, now).await?)
    }

    /// Apply the failure/backoff policy to a job that just failed an
    /// attempt: compute the next `attempts` count, consult
    /// `backoff_base`, and either move the job to `dead` or reschedule it.
    #[instrument(skip(self, job, error_text), fields(job_id = %job.id))]
    pub async fn finalize_failure(&self, job: &JobRow, error_text: String) -> Result<(), EngineError> {
        let now = self.clock.now();
        let attempts = job.attempts + 1;

        let outcome = if attempts > job.max_retries {
            FailureOutcome::Dead { attempts, error_text }
        } else {
            // A transient read failure here must not block finalizing the
            // job's failure outcome, so it falls back to the default base
            // the same way a missing or malformed value would.
            let backoff_base = self
                .store
                .get_config("backoff_base")
                .await
                .ok()
                .flatten()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_BACKOFF_BASE);
            let delay = delay_for_attempt(backoff_base, attempts as u32);
            FailureOutcome::Retry {
                attempts,
                available_at: now + delay,
                error_text,
            }
        };

        Ok(self.store.finalize_failure(&job.id, outcome, now).await?)
    }

    /// Transition `dead -> pending`. Fails with [`EngineError::InvalidTransition`]
    /// if the job was not in `dead`.
    #[instrument(skip(self), fields(job_id = job_id))]
    pub async fn dlq_retry(&self, job_id: &str) -> Result<(), EngineError> {
        let now = self.clock.now();
        let ok = self.store.dlq_retry(job_id, now).await?;
        if ok {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition(format!(
                "job '{job_id}' is not dead"
            )))
        }
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>, EngineError> {
        Ok(self.store.get_job(job_id).await?)
    }

    pub async fn list_jobs(&self, state: StateFilter) -> Result<Vec<JobRow>, EngineError> {
        Ok(self.store.list_jobs(state).await?)
    }

    pub async fn recent_jobs(&self, limit: i64) -> Result<Vec<JobRow>, EngineError> {
        Ok(self.store.recent_jobs(limit).await?)
    }

    pub async fn counts(&self) -> Result<StateCounts, EngineError> {
        Ok(self.store.counts().await?)
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerRow>, EngineError> {
        Ok(self.store.list_workers().await?)
    }

    pub async fn upsert_worker_heartbeat(&self, worker_id: &str, pid: u32, status: &str) -> Result<(), EngineError> {
        let now = self.clock.now();
        Ok(self.store.upsert_worker_heartbeat(worker_id, pid, status, now).await?)
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(self.store.get_config(key).await?)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), EngineError> {
        Ok(self.store.set_config(key, value).await?)
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

/// Read `poll_idle_secs` from config, falling back to the documented
/// default (0.5s) if unset or malformed.
pub async fn poll_idle_secs(store: &dyn JobStore) -> f64 {
    store
        .get_config("poll_idle_secs")
        .await
        .ok()
        .flatten()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.5)
}

/// Used by seed-test scenario 6 to assert the job's terminal state without
/// caring whether `JobState` is re-exported from `db` or `engine`.
pub fn is_terminal(state: JobState) -> bool {
    matches!(state, JobState::Completed | JobState::Dead)
}
