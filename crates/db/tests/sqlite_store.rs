//! Integration tests for `SqliteStore` against a real, temp-file-backed
//! SQLite database — the property tests that need genuine transactional
//! semantics (P2 in particular) run against `MemoryStore` instead, in
//! `engine`'s unit tests.

use chrono::Utc;
use db::{FailureOutcome, JobState, JobStore, NewJob, SqliteStore};
use tempfile::tempdir;

async fn store() -> SqliteStore {
    let dir = tempdir().unwrap();
    // leak the tempdir so the file survives for the lifetime of the test;
    // the OS cleans up the backing directory on process exit.
    let path = dir.keep().join("queue.db");
    SqliteStore::connect(path.to_str().unwrap()).await.unwrap()
}

fn job(command: &str) -> NewJob {
    NewJob {
        id: None,
        command: command.into(),
        max_retries: None,
        priority: None,
        available_at: None,
        run_timeout: None,
    }
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let path = path.to_str().unwrap();

    SqliteStore::connect(path).await.unwrap();
    // connecting again must not fail even though the tables already exist
    SqliteStore::connect(path).await.unwrap();
}

#[tokio::test]
async fn default_config_is_seeded() {
    let store = store().await;
    assert_eq!(store.get_config("max_retries_default").await.unwrap().as_deref(), Some("3"));
    assert_eq!(store.get_config("backoff_base").await.unwrap().as_deref(), Some("2"));
    assert_eq!(store.get_config("poll_idle_secs").await.unwrap().as_deref(), Some("0.5"));
}

#[tokio::test]
async fn enqueue_then_list_shows_job_exactly_once() {
    let store = store().await;
    let now = Utc::now();
    let created = store.enqueue(job("echo hi"), now).await.unwrap();

    let pending = store.list_jobs(Some(JobState::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, created.id);
}

#[tokio::test]
async fn claim_is_atomic_and_ordered_by_priority_then_age() {
    let store = store().await;
    let t0 = Utc::now();

    store
        .enqueue(
            NewJob { id: Some("low-pri".into()), command: "echo a".into(), max_retries: None, priority: Some(5), available_at: None, run_timeout: None },
            t0,
        )
        .await
        .unwrap();
    store
        .enqueue(
            NewJob { id: Some("high-pri".into()), command: "echo b".into(), max_retries: None, priority: Some(0), available_at: None, run_timeout: None },
            t0 + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let claimed = store.claim("w1", t0 + chrono::Duration::seconds(2)).await.unwrap().unwrap();
    assert_eq!(claimed.id, "high-pri");
    assert_eq!(claimed.state(), JobState::Processing);
    assert_eq!(claimed.worker_id.as_deref(), Some("w1"));

    // the same job is never handed out twice
    let second_claim = store.claim("w2", t0 + chrono::Duration::seconds(2)).await.unwrap().unwrap();
    assert_eq!(second_claim.id, "low-pri");
    assert!(store.claim("w3", t0 + chrono::Duration::seconds(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn finalize_failure_to_dead_requires_last_error() {
    let store = store().await;
    let now = Utc::now();
    let created = store
        .enqueue(
            NewJob { id: None, command: "false".into(), max_retries: Some(0), priority: None, available_at: None, run_timeout: None },
            now,
        )
        .await
        .unwrap();
    store.claim("w1", now).await.unwrap();

    store
        .finalize_failure(
            &created.id,
            FailureOutcome::Dead { attempts: 1, error_text: "boom".into() },
            now,
        )
        .await
        .unwrap();

    let row = store.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(row.state(), JobState::Dead);
    assert_eq!(row.last_error.as_deref(), Some("boom"));
    assert!(row.worker_id.is_none());
}

#[tokio::test]
async fn dlq_retry_round_trips() {
    let store = store().await;
    let now = Utc::now();
    let created = store
        .enqueue(
            NewJob { id: None, command: "false".into(), max_retries: Some(0), priority: None, available_at: None, run_timeout: None },
            now,
        )
        .await
        .unwrap();
    store.claim("w1", now).await.unwrap();
    store
        .finalize_failure(&created.id, FailureOutcome::Dead { attempts: 1, error_text: "boom".into() }, now)
        .await
        .unwrap();

    assert!(!store.dlq_retry("does-not-exist", now).await.unwrap());
    assert!(store.dlq_retry(&created.id, now).await.unwrap());

    let row = store.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(row.state(), JobState::Pending);
    assert_eq!(row.attempts, 0);
    assert!(row.last_error.is_none());

    // an immediate claim succeeds right away
    assert!(store.claim("w2", now).await.unwrap().is_some());
}

#[tokio::test]
async fn worker_heartbeat_upserts() {
    let store = store().await;
    let t0 = Utc::now();
    store.upsert_worker_heartbeat("w1", 1234, "idle", t0).await.unwrap();
    store
        .upsert_worker_heartbeat("w1", 1234, "processing:job-1", t0 + chrono::Duration::seconds(2))
        .await
        .unwrap();

    let workers = store.list_workers().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].status, "processing:job-1");
}
