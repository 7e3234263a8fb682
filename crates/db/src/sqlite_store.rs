//! SQLite-backed [`JobStore`].
//!
//! A transactional store over a single file-backed `sqlx::SqlitePool`: WAL
//! journaling for durability and reader/writer concurrency, a ≥30s busy
//! timeout, and `BEGIN IMMEDIATE` for the one operation (`claim`) whose
//! invariant — at most one worker ever observes a given job's claim —
//! depends on write-exclusivity.
//!
//! Queries are built with the runtime-checked `sqlx::query`/`query_as`
//! functions rather than the `query!`/`query_as!` macros, since those
//! macros require a live database (or a `.sqlx` offline cache) at build
//! time, neither of which this workspace provisions.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{JobRow, JobState, NewJob, StateCounts, WorkerRow};
use crate::store::{FailureOutcome, JobStore, StateFilter};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MAX_RETRIES: i64 = 3;
const DEFAULT_BACKOFF_BASE: &str = "2";
const DEFAULT_POLL_IDLE_SECS: &str = "0.5";

const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, created_at, updated_at, \
    available_at, priority, run_timeout, worker_id, started_at, finished_at, last_error, output";

/// A file-backed SQLite job store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and, if absent, create) the database at `path`.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        info!("opening queue store at {path}");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(StoreError::from_sqlx)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the schema if it does not already exist (idempotent) and
    /// seed the default config entries.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs(
                id TEXT PRIMARY KEY,
                command TEXT NOT NULL,
                state TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                available_at TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                run_timeout INTEGER,
                worker_id TEXT,
                started_at TEXT,
                finished_at TEXT,
                last_error TEXT,
                output TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workers(
                id TEXT PRIMARY KEY,
                pid INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                heartbeat_at TEXT NOT NULL,
                status TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        for (key, value) in [
            ("max_retries_default", DEFAULT_MAX_RETRIES.to_string()),
            ("backoff_base", DEFAULT_BACKOFF_BASE.to_string()),
            ("poll_idle_secs", DEFAULT_POLL_IDLE_SECS.to_string()),
        ] {
            sqlx::query("INSERT INTO kv(key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        Ok(())
    }

    fn row_from(row: &sqlx::sqlite::SqliteRow) -> Result<JobRow, StoreError> {
        use sqlx::FromRow;
        JobRow::from_row(row).map_err(StoreError::from_sqlx)
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn enqueue(&self, spec: NewJob, now: DateTime<Utc>) -> Result<JobRow, StoreError> {
        let id = spec.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let max_retries = spec.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let priority = spec.priority.unwrap_or(0);
        let available_at = spec.available_at.unwrap_or(now);

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, command, state, attempts, max_retries, created_at, updated_at,
                 available_at, priority, run_timeout)
            VALUES (?1, ?2, 'pending', 0, ?3, ?4, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(&spec.command)
        .bind(max_retries)
        .bind(now)
        .bind(available_at)
        .bind(priority)
        .bind(spec.run_timeout)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        self.get_job(&id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn claim(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<JobRow>, StoreError> {
        // `sqlx::Transaction` always issues a plain `BEGIN`; the write-exclusive
        // bracket this operation's atomicity depends on requires `BEGIN
        // IMMEDIATE` issued directly on a held connection instead.
        let mut conn = self.pool.acquire().await.map_err(StoreError::from_sqlx)?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from_sqlx)?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'processing', worker_id = ?1, started_at = ?2, updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'pending' AND available_at <= ?2
                ORDER BY priority ASC, created_at ASC
                LIMIT 1
            )
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .execute(&mut *conn)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(StoreError::from_sqlx(e));
            }
        };

        if result.rows_affected() == 0 {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(StoreError::from_sqlx)?;
            return Ok(None);
        }

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE worker_id = ?1 AND state = 'processing' \
             ORDER BY started_at DESC LIMIT 1"
        );
        let row = match sqlx::query(&sql).bind(worker_id).fetch_one(&mut *conn).await {
            Ok(row) => row,
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(StoreError::from_sqlx(e));
            }
        };
        let job = Self::row_from(&row)?;

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(Some(job))
    }

    async fn finalize_success(
        &self,
        job_id: &str,
        attempts: i64,
        output: String,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed', attempts = ?1, finished_at = ?2, updated_at = ?2,
                output = ?3, worker_id = NULL
            WHERE id = ?4
            "#,
        )
        .bind(attempts)
        .bind(now)
        .bind(output)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn finalize_failure(
        &self,
        job_id: &str,
        outcome: FailureOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match outcome {
            FailureOutcome::Dead { attempts, error_text } => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'dead', attempts = ?1, finished_at = ?2, updated_at = ?2,
                        last_error = ?3, worker_id = NULL, started_at = NULL
                    WHERE id = ?4
                    "#,
                )
                .bind(attempts)
                .bind(now)
                .bind(error_text)
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            }
            FailureOutcome::Retry {
                attempts,
                available_at,
                error_text,
            } => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'pending', attempts = ?1, available_at = ?2, updated_at = ?3,
                        last_error = ?4, worker_id = NULL, started_at = NULL
                    WHERE id = ?5
                    "#,
                )
                .bind(attempts)
                .bind(available_at)
                .bind(now)
                .bind(error_text)
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            }
        }
        Ok(())
    }

    async fn dlq_retry(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending', attempts = 0, available_at = ?1, updated_at = ?1,
                last_error = NULL, finished_at = NULL
            WHERE id = ?2 AND state = 'dead'
            "#,
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_from).transpose()
    }

    async fn list_jobs(&self, state: StateFilter) -> Result<Vec<JobRow>, StoreError> {
        let rows = match state {
            Some(state) => {
                let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE state = ?1 ORDER BY created_at ASC");
                sqlx::query(&sql)
                    .bind(state.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at ASC");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(StoreError::from_sqlx)?;

        rows.iter().map(Self::row_from).collect()
    }

    async fn recent_jobs(&self, limit: i64) -> Result<Vec<JobRow>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY updated_at DESC LIMIT ?1");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        rows.iter().map(Self::row_from).collect()
    }

    async fn counts(&self) -> Result<StateCounts, StoreError> {
        let mut counts = StateCounts::default();
        let rows = sqlx::query("SELECT state, COUNT(*) as n FROM jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        for row in rows {
            let state: String = row.try_get("state").map_err(StoreError::from_sqlx)?;
            let n: i64 = row.try_get("n").map_err(StoreError::from_sqlx)?;
            match JobState::from_str(&state) {
                Ok(JobState::Pending) => counts.pending = n,
                Ok(JobState::Processing) => counts.processing = n,
                Ok(JobState::Completed) => counts.completed = n,
                Ok(JobState::Dead) => counts.dead = n,
                Err(_) => {}
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
        sqlx::query(
            r#"
            INSERT INTO workers(id, pid, started_at, heartbeat_at, status)
            VALUES (?1, ?2, ?3, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET heartbeat_at = excluded.heartbeat_at, status = excluded.status
            "#,
        )
        .bind(worker_id)
        .bind(pid as i64)
        .bind(now)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRow>, StoreError> {
        use sqlx::FromRow;
        let rows = sqlx::query("SELECT id, pid, started_at, heartbeat_at, status FROM workers")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        rows.iter()
            .map(|r| WorkerRow::from_row(r).map_err(StoreError::from_sqlx))
            .collect()
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .map_err(StoreError::from_sqlx)
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv(key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}
