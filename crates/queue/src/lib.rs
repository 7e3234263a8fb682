//! `queue` crate — the worker loop and its process supervisor.

pub mod shutdown;
pub mod supervisor;
pub mod worker;

pub use shutdown::{install_signal_handler, ShutdownFlag};
pub use supervisor::{run as run_supervisor, WORKER_RUN_SUBCOMMAND};
pub use worker::Worker;
