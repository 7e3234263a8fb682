//! The single read-only dashboard route, `GET /`.
//!
//! Renders job counts, the worker table, and the twenty most recently
//! updated jobs. No mutation endpoints — the dashboard only ever reads
//! through the engine.

use axum::extract::State;
use axum::response::Html;
use engine::QueueEngine;

use crate::AppState;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

async fn render(engine: &QueueEngine) -> Result<String, engine::EngineError> {
    let counts = engine.counts().await?;
    let workers = engine.list_workers().await?;
    let jobs = engine.recent_jobs(20).await?;

    let mut workers_rows = String::new();
    for w in &workers {
        workers_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&w.id),
            w.pid,
            escape(&w.status),
            w.heartbeat_at.to_rfc3339(),
        ));
    }

    let mut jobs_rows = String::new();
    for j in &jobs {
        jobs_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&j.id),
            escape(&j.state),
            escape(&j.command),
            j.attempts,
            j.max_retries,
            j.updated_at.to_rfc3339(),
        ));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Queue Dashboard</title>
  <style>
    body {{ font-family: Arial, sans-serif; padding: 20px; }}
    h1 {{ margin-bottom: 5px; }}
    table {{ border-collapse: collapse; width: 100%; margin-top: 10px; }}
    th, td {{ border: 1px solid #aaa; padding: 6px; font-size: 14px; }}
    th {{ background: #eee; }}
  </style>
</head>
<body>

<h1>Queue Status</h1>

<h3>Job Counts</h3>
<table>
<tr><th>State</th><th>Count</th></tr>
<tr><td>Pending</td><td>{pending}</td></tr>
<tr><td>Processing</td><td>{processing}</td></tr>
<tr><td>Completed</td><td>{completed}</td></tr>
<tr><td>Dead (DLQ)</td><td>{dead}</td></tr>
<tr><td><b>Total Jobs</b></td><td><b>{total}</b></td></tr>
</table>

<h3>Active Workers</h3>
<table>
<tr><th>ID</th><th>PID</th><th>Status</th><th>Last Heartbeat</th></tr>
{workers_rows}
</table>

<h3>Recent Jobs</h3>
<table>
<tr><th>ID</th><th>State</th><th>Command</th><th>Attempts</th><th>Max</th><th>Updated</th></tr>
{jobs_rows}
</table>

</body>
</html>
"#,
        pending = counts.pending,
        processing = counts.processing,
        completed = counts.completed,
        dead = counts.dead,
        total = counts.total(),
    ))
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    match render(&state.engine).await {
        Ok(body) => Html(body),
        Err(e) => Html(format!("<html><body><pre>dashboard error: {e}</pre></body></html>")),
    }
}
