//! The cooperative shutdown flag checked between worker loop iterations.
//!
//! A signal handler must be async-signal-safe: it may only set this flag,
//! never touch the store or do anything else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown flag. Cloning is cheap (it's an `Arc`).
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Install a handler that sets `flag` on SIGINT/SIGTERM (ctrl_c covers both
/// on the platforms tokio supports for a single process).
pub fn install_signal_handler(flag: ShutdownFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.set();
        }
    });
}
