//! In-process [`JobStore`] fake, used by the engine's property tests.
//!
//! A hand-rolled implementation of the trait good enough to exercise the
//! engine's logic without a real database, with the same atomicity
//! guarantee on `claim` that `SqliteStore` gets from `BEGIN IMMEDIATE` —
//! here enforced with a single `std::sync::Mutex` instead of file-level
//! locking.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{JobRow, JobState, NewJob, StateCounts, WorkerRow};
use crate::store::{FailureOutcome, JobStore, StateFilter};

struct Inner {
    jobs: HashMap<String, JobRow>,
    workers: HashMap<String, WorkerRow>,
    config: HashMap<String, String>,
    next_seq: u64,
}

/// An in-memory [`JobStore`]. Not persisted; intended for tests only.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                workers: HashMap::new(),
                config: HashMap::new(),
                next_seq: 0,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, spec: NewJob, now: DateTime<Utc>) -> Result<JobRow, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = spec.id.unwrap_or_else(|| {
            inner.next_seq += 1;
            format!("mem-{}", inner.next_seq)
        });
        let row = JobRow {
            id: id.clone(),
            command: spec.command,
            state: JobState::Pending.to_string(),
            attempts: 0,
            max_retries: spec.max_retries.unwrap_or(3),
            created_at: now,
            updated_at: now,
            available_at: spec.available_at.unwrap_or(now),
            priority: spec.priority.unwrap_or(0),
            run_timeout: spec.run_timeout,
            worker_id: None,
            started_at: None,
            finished_at: None,
            last_error: None,
            output: None,
        };
        inner.jobs.insert(id, row.clone());
        Ok(row)
    }

    async fn claim(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<JobRow>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let candidate_id = inner
            .jobs
            .values()
            .filter(|j| j.state() == JobState::Pending && j.available_at <= now)
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|j| j.id.clone());

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        let row = inner.jobs.get_mut(&id).unwrap();
        row.state = JobState::Processing.to_string();
        row.worker_id = Some(worker_id.to_string());
        row.started_at = Some(now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn finalize_success(
        &self,
        job_id: &str,
        attempts: i64,
        output: String,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner.jobs.get_mut(job_id).ok_or(StoreError::NotFound)?;
        row.state = JobState::Completed.to_string();
        row.attempts = attempts;
        row.finished_at = Some(now);
        row.updated_at = now;
        row.output = Some(output);
        row.worker_id = None;
        Ok(())
    }

    async fn finalize_failure(
        &self,
        job_id: &str,
        outcome: FailureOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner.jobs.get_mut(job_id).ok_or(StoreError::NotFound)?;
        match outcome {
            FailureOutcome::Dead { attempts, error_text } => {
                row.state = JobState::Dead.to_string();
                row.attempts = attempts;
                row.finished_at = Some(now);
                row.last_error = Some(error_text);
                row.worker_id = None;
                row.started_at = None;
            }
            FailureOutcome::Retry {
                attempts,
                available_at,
                error_text,
            } => {
                row.state = JobState::Pending.to_string();
                row.attempts = attempts;
                row.available_at = available_at;
                row.last_error = Some(error_text);
                row.worker_id = None;
                row.started_at = None;
            }
        }
        row.updated_at = now;
        Ok(())
    }

    async fn dlq_retry(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(row) = inner.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if row.state() != JobState::Dead {
            return Ok(false);
        }
        row.state = JobState::Pending.to_string();
        row.attempts = 0;
        row.available_at = now;
        row.updated_at = now;
        row.last_error = None;
        row.finished_at = None;
        Ok(true)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>, StoreError> {
        Ok(self.inner.lock().unwrap().jobs.get(job_id).cloned())
    }

    async fn list_jobs(&self, state: StateFilter) -> Result<Vec<JobRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<JobRow> = inner
            .jobs
            .values()
            .filter(|j| state.map(|s| j.state() == s).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|j| j.created_at);
        Ok(rows)
    }

    async fn recent_jobs(&self, limit: i64) -> Result<Vec<JobRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<JobRow> = inner.jobs.values().cloned().collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn counts(&self) -> Result<StateCounts, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut counts = StateCounts::default();
        for job in inner.jobs.values() {
            match job.state() {
                JobState::Pending => counts.pending += 1,
                JobState::Processing => counts.processing += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Dead => counts.dead += 1,
            }
        }
        Ok(counts)
    }

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        pid: u32,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .workers
            .entry(worker_id.to_string())
            .and_modify(|w| {
                w.heartbeat_at = now;
                w.status = status.to_string();
            })
            .or_insert(WorkerRow {
                id: worker_id.to_string(),
                pid: pid as i64,
                started_at: now,
                heartbeat_at: now,
                status: status.to_string(),
            });
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRow>, StoreError> {
        Ok(self.inner.lock().unwrap().workers.values().cloned().collect())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().config.get(key).cloned())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
