//! Seed scenarios driven end-to-end through [`Worker::run`] against a real,
//! temp-file-backed `db::SqliteStore`. Scenarios 1 and 5 spawn a genuine
//! `sh -c echo`; scenario 2 scripts its failures with `executor::MockSequence`
//! since there's no portable shell one-liner that fails exactly twice.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use db::{JobState, NewJob, SqliteStore};
use engine::{QueueEngine, SystemClock};
use executor::{MockBehaviour, MockSequence, ShellExecutor};
use queue::{ShutdownFlag, Worker};
use tempfile::tempdir;

async fn engine() -> Arc<QueueEngine> {
    let dir = tempdir().unwrap();
    let path = dir.keep().join("queue.db");
    let store = SqliteStore::connect(path.to_str().unwrap()).await.unwrap();
    Arc::new(QueueEngine::new(Arc::new(store), Arc::new(SystemClock)))
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

/// Stop `worker` once the shutdown flag is set and the spawned task observes
/// it at the top of its next loop iteration.
async fn stop(shutdown: &ShutdownFlag, handle: tokio::task::JoinHandle<()>) {
    shutdown.set();
    tokio::time::timeout(StdDuration::from_secs(2), handle)
        .await
        .expect("worker did not stop after shutdown flag was set")
        .unwrap();
}

#[tokio::test]
async fn seed_scenario_1_happy_path() {
    let engine = engine().await;
    engine.enqueue(job("echo hi")).await.unwrap();

    let shutdown = ShutdownFlag::new();
    let worker = Worker::new(Arc::clone(&engine), Arc::new(ShellExecutor), shutdown.clone());
    let handle = tokio::spawn(async move { worker.run().await });

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(2);
    while engine.counts().await.unwrap().completed < 1 {
        assert!(tokio::time::Instant::now() < deadline, "job did not complete within 2s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    stop(&shutdown, handle).await;

    let row = engine.recent_jobs(1).await.unwrap().pop().unwrap();
    assert_eq!(row.state(), JobState::Completed);
    assert!(row.output.unwrap_or_default().starts_with("hi"));
}

#[tokio::test]
async fn seed_scenario_2_retry_then_success() {
    let engine = engine().await;
    engine.set_config("backoff_base", "1").await.unwrap();
    let created = engine
        .enqueue(NewJob {
            id: None,
            command: "flaky".into(),
            max_retries: Some(3),
            priority: None,
            available_at: None,
            run_timeout: None,
        })
        .await
        .unwrap();

    let executor = Arc::new(MockSequence::new(vec![
        MockBehaviour::Succeed { exit_code: 1, stdout: String::new(), stderr: "boom 1".into() },
        MockBehaviour::Succeed { exit_code: 1, stdout: String::new(), stderr: "boom 2".into() },
        MockBehaviour::Succeed { exit_code: 0, stdout: "ok\n".into(), stderr: String::new() },
    ]));

    let shutdown = ShutdownFlag::new();
    let worker = Worker::new(Arc::clone(&engine), executor, shutdown.clone());
    let handle = tokio::spawn(async move { worker.run().await });

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
    loop {
        let row = engine.get_job(&created.id).await.unwrap().unwrap();
        if engine::queue::is_terminal(row.state()) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job did not reach a terminal state within 5s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    stop(&shutdown, handle).await;

    let row = engine.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(row.state(), JobState::Completed);
    assert_eq!(row.attempts, 3);
}

#[tokio::test]
async fn seed_scenario_3_exhaustion_to_dead() {
    let engine = engine().await;
    let created = engine
        .enqueue(NewJob {
            id: None,
            command: "false".into(),
            max_retries: Some(1),
            priority: None,
            available_at: None,
            run_timeout: None,
        })
        .await
        .unwrap();

    let shutdown = ShutdownFlag::new();
    let worker = Worker::new(Arc::clone(&engine), Arc::new(ShellExecutor), shutdown.clone());
    let handle = tokio::spawn(async move { worker.run().await });

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(3);
    loop {
        let row = engine.get_job(&created.id).await.unwrap().unwrap();
        if row.state() == JobState::Dead {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job did not reach dead within 3s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    stop(&shutdown, handle).await;

    let row = engine.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(row.state(), JobState::Dead);
    assert_eq!(row.attempts, 2);
    assert!(row.last_error.as_deref().is_some_and(|e| !e.is_empty()));

    let dlq = engine.list_jobs(Some(JobState::Dead)).await.unwrap();
    assert_eq!(dlq.len(), 1);
}

#[tokio::test]
async fn seed_scenario_4_dlq_retry() {
    let engine = engine().await;
    let created = engine
        .enqueue(NewJob {
            id: None,
            command: "false".into(),
            max_retries: Some(0),
            priority: None,
            available_at: None,
            run_timeout: None,
        })
        .await
        .unwrap();

    let shutdown = ShutdownFlag::new();
    let worker = Worker::new(Arc::clone(&engine), Arc::new(ShellExecutor), shutdown.clone());
    let handle = tokio::spawn(async move { worker.run().await });

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(3);
    loop {
        let row = engine.get_job(&created.id).await.unwrap().unwrap();
        if row.state() == JobState::Dead {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job did not reach dead within 3s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    stop(&shutdown, handle).await;

    engine.dlq_retry(&created.id).await.unwrap();
    let row = engine.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(row.state(), JobState::Pending);
    assert_eq!(row.attempts, 0);
    assert!(row.last_error.is_none());
}

#[tokio::test]
async fn seed_scenario_5_priority() {
    let engine = engine().await;
    engine
        .enqueue(NewJob { id: Some("a".into()), command: "echo A".into(), max_retries: None, priority: Some(5), available_at: None, run_timeout: None })
        .await
        .unwrap();
    engine
        .enqueue(NewJob { id: Some("b".into()), command: "echo B".into(), max_retries: None, priority: Some(0), available_at: None, run_timeout: None })
        .await
        .unwrap();

    let shutdown = ShutdownFlag::new();
    let worker = Worker::new(Arc::clone(&engine), Arc::new(ShellExecutor), shutdown.clone());
    let handle = tokio::spawn(async move { worker.run().await });

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(3);
    while engine.counts().await.unwrap().completed < 2 {
        assert!(tokio::time::Instant::now() < deadline, "both jobs did not complete within 3s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    stop(&shutdown, handle).await;

    let a = engine.get_job("a").await.unwrap().unwrap();
    let b = engine.get_job("b").await.unwrap().unwrap();
    assert!(
        b.finished_at.unwrap() <= a.finished_at.unwrap(),
        "priority-0 job B should finish at or before priority-5 job A"
    );
}

#[tokio::test]
async fn seed_scenario_6_concurrent_workers() {
    let engine = engine().await;
    for i in 0..100 {
        engine.enqueue(job(&format!("echo job-{i}"))).await.unwrap();
    }

    let shutdown = ShutdownFlag::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let worker = Worker::new(Arc::clone(&engine), Arc::new(ShellExecutor), shutdown.clone());
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(10);
    while engine.counts().await.unwrap().completed < 100 {
        assert!(tokio::time::Instant::now() < deadline, "100 jobs did not complete within 10s");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    shutdown.set();
    for handle in handles {
        tokio::time::timeout(StdDuration::from_secs(2), handle)
            .await
            .expect("worker did not stop after shutdown flag was set")
            .unwrap();
    }

    let counts = engine.counts().await.unwrap();
    assert_eq!(counts.completed, 100);
    for row in engine.list_jobs(None).await.unwrap() {
        assert!(row.attempts <= 1, "job {} had {} attempts", row.id, row.attempts);
    }
}
