//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the queue engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persistence error from the `db` crate.
    #[error("store error: {0}")]
    Store(#[from] db::StoreError),

    /// A requested state transition is not admissible from the job's
    /// current state (e.g. `dlq_retry` on a job that isn't `dead`).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Malformed input — bad JSON on enqueue, unknown state filter, a
    /// non-integer where an integer was required.
    #[error("bad input: {0}")]
    BadInput(String),
}
