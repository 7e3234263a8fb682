//! The `CommandExecutor` trait — the contract every executor must fulfil.

use async_trait::async_trait;

use crate::ExecutorError;

/// The outcome of running a job's command to completion.
#[derive(Debug, Clone)]
pub struct Output {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a job's command and captures its result.
///
/// Given a command string and an optional timeout (seconds), run it as a
/// shell command and return `(exit_code, stdout, stderr)`. A timeout must
/// surface as [`ExecutorError::Timeout`], distinguishable from an ordinary
/// non-zero exit. Implementations do not retry and inherit the calling
/// process's environment.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &str, run_timeout: Option<i64>) -> Result<Output, ExecutorError>;
}
