//! `Supervisor` — spawns N worker OS processes, forwards shutdown signals,
//! joins them.
//!
//! Workers are *real* processes (the compiled binary re-invoked with a
//! hidden subcommand carrying its worker id), not `tokio::task`s: the
//! project's concurrency model treats "no shared in-memory state between
//! workers" as load-bearing, not a mere performance characteristic, so the
//! Store has to be the only coordination medium even within one supervisor
//! run. The supervisor itself never touches the store.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use uuid::Uuid;

use crate::shutdown::ShutdownFlag;

/// Internal subcommand the supervisor uses to re-invoke the binary as a
/// single worker process. Not part of the public CLI surface.
pub const WORKER_RUN_SUBCOMMAND: &str = "__worker-run";

#[cfg(unix)]
fn send_terminate(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) {}

/// Spawn `count` worker processes, each re-invoking the current executable
/// with `__worker-run <worker_id> --db <db_path>`. Waits for all to exit;
/// on shutdown, forwards SIGTERM to any still alive.
pub async fn run(count: usize, db_path: &str, shutdown: ShutdownFlag) -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let mut children: Vec<Child> = Vec::with_capacity(count);

    for _ in 0..count.max(1) {
        let worker_id = Uuid::new_v4().to_string();
        let child = Command::new(&exe)
            .arg(WORKER_RUN_SUBCOMMAND)
            .arg(&worker_id)
            .arg("--db")
            .arg(db_path)
            .stdin(Stdio::null())
            .spawn()?;
        info!("spawned worker process {} (worker_id={worker_id})", child.id().unwrap_or(0));
        children.push(child);
    }

    loop {
        if shutdown.is_set() {
            break;
        }
        if children.iter_mut().all(|c| matches!(c.try_wait(), Ok(Some(_)))) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }

    if shutdown.is_set() {
        for child in &children {
            if let Some(pid) = child.id() {
                send_terminate(pid);
            }
        }
    }

    for mut child in children {
        match child.wait().await {
            Ok(status) => info!("worker process exited: {status}"),
            Err(e) => warn!("failed to join worker process: {e}"),
        }
    }

    Ok(())
}
