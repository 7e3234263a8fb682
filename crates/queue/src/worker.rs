//! `Worker` — the long-running per-process loop: heartbeat → claim →
//! execute → finalize.
//!
//! Runs inside its own OS process (see [`crate::supervisor::run`]). Within
//! a worker the loop is strictly sequential — one job at a time — and no
//! write transaction is held across the idle sleep or the blocking
//! executor call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use engine::QueueEngine;
use executor::CommandExecutor;

use crate::shutdown::ShutdownFlag;

/// A worker heartbeats at least once per iteration, and a registration
/// older than `WORKER_STALE_AFTER_SECS` is considered stale by observers.
/// The core does not itself read this constant to reclaim jobs — see the
/// acknowledged operational gap in the project's design notes.
pub const HEARTBEAT_SECS: u64 = 2;
#[allow(dead_code)]
pub const WORKER_STALE_AFTER_SECS: u64 = 10;

/// One worker's identity and dependencies.
pub struct Worker {
    pub id: String,
    engine: Arc<QueueEngine>,
    executor: Arc<dyn CommandExecutor>,
    shutdown: ShutdownFlag,
}

impl Worker {
    pub fn new(engine: Arc<QueueEngine>, executor: Arc<dyn CommandExecutor>, shutdown: ShutdownFlag) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), engine, executor, shutdown)
    }

    pub fn with_id(
        id: String,
        engine: Arc<QueueEngine>,
        executor: Arc<dyn CommandExecutor>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            id,
            engine,
            executor,
            shutdown,
        }
    }

    /// Run the loop until the shutdown flag is observed.
    #[instrument(skip(self), fields(worker_id = %self.id))]
    pub async fn run(&self) {
        let pid = std::process::id();
        info!("worker {} starting (pid {})", self.id, pid);

        loop {
            if self.shutdown.is_set() {
                break;
            }

            if let Err(e) = self.engine.upsert_worker_heartbeat(&self.id, pid, "idle").await {
                warn!("worker {} heartbeat failed: {e}", self.id);
            }

            let claimed = match self.engine.claim(&self.id).await {
                Ok(job) => job,
                Err(e) => {
                    warn!("worker {} claim failed: {e}", self.id);
                    None
                }
            };

            let Some(job) = claimed else {
                let idle_secs = engine::queue::poll_idle_secs(&*self.engine.store()).await;
                tokio::time::sleep(Duration::from_secs_f64(idle_secs)).await;
                continue;
            };

            if let Err(e) = self
                .engine
                .upsert_worker_heartbeat(&self.id, pid, &format!("processing:{}", job.id))
                .await
            {
                warn!("worker {} heartbeat failed: {e}", self.id);
            }

            self.run_one(&job).await;
        }

        let _ = self.engine.upsert_worker_heartbeat(&self.id, pid, "stopped").await;
        info!("worker {} stopped", self.id);
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn run_one(&self, job: &db::JobRow) {
        let result = self.executor.run(&job.command, job.run_timeout).await;

        match result {
            Ok(output) if output.exit_code == 0 => {
                if let Err(e) = self.engine.finalize_success(job, output.stdout).await {
                    warn!("worker {} failed to finalize success for {}: {e}", self.id, job.id);
                }
            }
            Ok(output) => {
                let error_text = output.stderr.trim().to_string();
                if let Err(e) = self.engine.finalize_failure(job, error_text).await {
                    warn!("worker {} failed to finalize failure for {}: {e}", self.id, job.id);
                }
            }
            Err(exec_err) => {
                if let Err(e) = self.engine.finalize_failure(job, exec_err.to_string()).await {
                    warn!("worker {} failed to finalize failure for {}: {e}", self.id, job.id);
                }
            }
        }
    }
}
