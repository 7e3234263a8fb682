//! Executor-level error type.

use thiserror::Error;

/// Errors returned by a [`crate::CommandExecutor`]'s `run` method.
///
/// The worker loop converts either variant into a `finalize_failure` call —
/// neither propagates as a process-level error.
#[derive(Debug, Error, Clone)]
pub enum ExecutorError {
    /// The command did not finish within `run_timeout`.
    #[error("timeout")]
    Timeout,

    /// The command could not be spawned, or some other I/O failure occurred
    /// while running it.
    #[error("executor error: {0}")]
    Other(String),
}
