//! `queuectl` — CLI entry-point for the durable background job queue.
//!
//! Subcommands:
//! - `enqueue <job_json>` — submit a job
//! - `list [--state S]`   — tabulate jobs
//! - `status`             — counts per state
//! - `worker start [--count N]` — launch the supervisor
//! - `dlq list` / `dlq retry <id>`
//! - `config get/set`
//! - `dashboard [--bind ADDR]` — serve the read-only HTML dashboard
//!
//! `__worker-run <worker_id>` is a hidden subcommand the supervisor uses to
//! re-invoke this binary as a single worker process; it is not part of the
//! documented CLI surface.

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::Table;
use tracing::info;

use db::{JobState, NewJob, SqliteStore};
use engine::{QueueEngine, SystemClock};
use executor::ShellExecutor;
use queue::{ShutdownFlag, Worker};

#[derive(Parser)]
#[command(name = "queuectl", about = "Durable background job queue", version)]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, env = "QUEUECTL_DB", default_value = "queue.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a job. `<job_json>` must contain at least `command`.
    Enqueue { job_json: String },
    /// List jobs, optionally filtered by state.
    List {
        #[arg(long = "state")]
        state: Option<String>,
    },
    /// Print counts per state and the total.
    Status,
    /// Launch the worker supervisor.
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// Dead-letter queue operations.
    Dlq {
        #[command(subcommand)]
        action: DlqAction,
    },
    /// Read or write a config entry.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve the read-only HTML dashboard.
    Dashboard {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Internal: run a single worker process. Invoked by the supervisor.
    #[command(name = "__worker-run", hide = true)]
    WorkerRun { worker_id: String },
}

#[derive(Subcommand)]
enum WorkerAction {
    /// Spawn N worker processes and block until they exit.
    Start {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum DlqAction {
    /// List jobs currently in `dead`.
    List,
    /// Return a dead job to `pending`.
    Retry { job_id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
}

async fn build_engine(db_path: &str) -> Result<Arc<QueueEngine>, String> {
    let store = SqliteStore::connect(db_path)
        .await
        .map_err(|e| format!("failed to open store: {e}"))?;
    Ok(Arc::new(QueueEngine::new(Arc::new(store), Arc::new(SystemClock))))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Enqueue { job_json } => {
            let spec: NewJob = serde_json::from_str(&job_json)
                .map_err(|e| format!("invalid job JSON: {e}"))?;
            let engine = build_engine(&cli.db).await?;
            let job = engine.enqueue(spec).await.map_err(|e| e.to_string())?;
            println!("{}", job.id);
            Ok(())
        }

        Command::List { state } => {
            let filter = match state {
                Some(s) => Some(
                    s.parse::<JobState>()
                        .map_err(|e| format!("unknown state '{s}': {e}"))?,
                ),
                None => None,
            };
            let engine = build_engine(&cli.db).await?;
            let jobs = engine.list_jobs(filter).await.map_err(|e| e.to_string())?;

            let mut table = Table::new();
            table.set_header(vec!["id", "state", "command", "attempts", "max_retries", "updated_at"]);
            for job in jobs {
                table.add_row(vec![
                    job.id,
                    job.state,
                    job.command,
                    job.attempts.to_string(),
                    job.max_retries.to_string(),
                    job.updated_at.to_rfc3339(),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        Command::Status => {
            let engine = build_engine(&cli.db).await?;
            let counts = engine.counts().await.map_err(|e| e.to_string())?;

            let mut table = Table::new();
            table.set_header(vec!["state", "count"]);
            table.add_row(vec!["pending".to_string(), counts.pending.to_string()]);
            table.add_row(vec!["processing".to_string(), counts.processing.to_string()]);
            table.add_row(vec!["completed".to_string(), counts.completed.to_string()]);
            table.add_row(vec!["dead".to_string(), counts.dead.to_string()]);
            table.add_row(vec!["total".to_string(), counts.total().to_string()]);
            println!("{table}");
            Ok(())
        }

        Command::Worker { action } => match action {
            WorkerAction::Start { count } => {
                info!("starting {count} worker process(es)");
                let shutdown = ShutdownFlag::new();
                queue::install_signal_handler(shutdown.clone());
                queue::run_supervisor(count, &cli.db, shutdown)
                    .await
                    .map_err(|e| format!("supervisor failed: {e}"))
            }
        },

        Command::Dlq { action } => match action {
            DlqAction::List => {
                let engine = build_engine(&cli.db).await?;
                let jobs = engine
                    .list_jobs(Some(JobState::Dead))
                    .await
                    .map_err(|e| e.to_string())?;

                let mut table = Table::new();
                table.set_header(vec!["id", "command", "attempts", "last_error", "finished_at"]);
                for job in jobs {
                    table.add_row(vec![
                        job.id,
                        job.command,
                        job.attempts.to_string(),
                        job.last_error.unwrap_or_default(),
                        job.finished_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ]);
                }
                println!("{table}");
                Ok(())
            }
            DlqAction::Retry { job_id } => {
                let engine = build_engine(&cli.db).await?;
                engine.dlq_retry(&job_id).await.map_err(|e| e.to_string())?;
                println!("{job_id}");
                Ok(())
            }
        },

        Command::Config { action } => match action {
            ConfigAction::Get { key } => {
                let engine = build_engine(&cli.db).await?;
                match engine.get_config(&key).await.map_err(|e| e.to_string())? {
                    Some(value) => {
                        println!("{value}");
                        Ok(())
                    }
                    None => Err(format!("no config entry for '{key}'")),
                }
            }
            ConfigAction::Set { key, value } => {
                let engine = build_engine(&cli.db).await?;
                engine.set_config(&key, &value).await.map_err(|e| e.to_string())?;
                Ok(())
            }
        },

        Command::Dashboard { bind } => {
            let engine = build_engine(&cli.db).await?;
            api::serve(&bind, engine).await.map_err(|e| e.to_string())
        }

        Command::WorkerRun { worker_id } => {
            let engine = build_engine(&cli.db).await?;
            let shutdown = ShutdownFlag::new();
            queue::install_signal_handler(shutdown.clone());
            let worker = Worker::with_id(worker_id, engine, Arc::new(ShellExecutor), shutdown);
            worker.run().await;
            Ok(())
        }
    }
}
