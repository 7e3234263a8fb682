//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no retry/backoff policy.
//! That logic lives in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// jobs
// ---------------------------------------------------------------------------

/// The four legal states a job can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Dead,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "dead" => Ok(Self::Dead),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// A job row fetched from the `jobs` table.
///
/// `state` is stored as text in SQLite; it round-trips through
/// [`JobState`]'s `Display`/`FromStr` at the repository boundary rather
/// than being matched on as a raw string by callers outside `db`.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i64,
    pub max_retries: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub priority: i64,
    pub run_timeout: Option<i64>,
    pub worker_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub output: Option<String>,
}

impl JobRow {
    /// Parse the persisted `state` column.
    ///
    /// # Panics
    /// Panics if the row contains a state outside the four legal values —
    /// that would mean the schema was corrupted or written by a different
    /// version of this program.
    pub fn state(&self) -> JobState {
        self.state
            .parse()
            .unwrap_or_else(|e| panic!("corrupt job row {}: {e}", self.id))
    }
}

/// Input to [`crate::JobStore::enqueue`]; mirrors the optional fields a
/// caller may supply when submitting a job, and doubles as the shape of
/// the `enqueue <job_json>` CLI argument.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub id: Option<String>,
    pub command: String,
    pub max_retries: Option<i64>,
    pub priority: Option<i64>,
    pub available_at: Option<DateTime<Utc>>,
    pub run_timeout: Option<i64>,
}

// ---------------------------------------------------------------------------
// workers
// ---------------------------------------------------------------------------

/// A worker registration row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkerRow {
    pub id: String,
    pub pid: i64,
    pub started_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub status: String,
}

// ---------------------------------------------------------------------------
// counts (used by `status` and the dashboard)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub dead: i64,
}

impl StateCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.dead
    }
}
