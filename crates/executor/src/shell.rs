//! `ShellExecutor` — runs a job's command via `sh -c`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

use crate::error::ExecutorError;
use crate::traits::{CommandExecutor, Output};

/// Production [`CommandExecutor`]: spawns `sh -c <command>` and enforces
/// `run_timeout` with [`tokio::time::timeout`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    #[instrument(skip(self, command), fields(run_timeout))]
    async fn run(&self, command: &str, run_timeout: Option<i64>) -> Result<Output, ExecutorError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = match run_timeout {
            Some(secs) if secs > 0 => {
                match tokio::time::timeout(Duration::from_secs(secs as u64), child).await {
                    Ok(result) => result,
                    Err(_) => return Err(ExecutorError::Timeout),
                }
            }
            _ => child.await,
        };

        let output = output.map_err(|e| ExecutorError::Other(e.to_string()))?;

        Ok(Output {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
