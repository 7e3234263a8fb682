//! Typed error type for the db crate.

use thiserror::Error;

/// Errors a [`crate::JobStore`] implementation can return.
///
/// Mirrors the two kinds the core distinguishes at the store boundary:
/// transient write contention (`Busy`) and everything else (`Fatal`).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient write contention (`SQLITE_BUSY`) after the busy timeout
    /// expired. Callers may retry for idempotent operations (heartbeat,
    /// claim); `enqueue` surfaces it to its caller.
    #[error("store busy")]
    Busy,

    /// Corruption, I/O failure, or any other non-transient backend error.
    #[error("store error: {0}")]
    Fatal(#[from] sqlx::Error),

    /// A row expected to exist (e.g. the job just claimed) was not found.
    #[error("row not found")]
    NotFound,
}

impl StoreError {
    /// Classify a raw `sqlx` error, promoting `SQLITE_BUSY` to [`StoreError::Busy`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("5") {
                return StoreError::Busy;
            }
        }
        StoreError::Fatal(err)
    }
}
