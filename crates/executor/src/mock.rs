//! `MockExecutor` — a scriptable test double for `CommandExecutor`.
//!
//! Mirrors this workspace's `MockNode`/`MockBehaviour` pattern: callers
//! script a canned [`Output`] or [`ExecutorError`] per instance, and every
//! invocation is recorded for assertions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::ExecutorError;
use crate::traits::{CommandExecutor, Output};

/// Scripted behaviour for a [`MockExecutor`].
pub enum MockBehaviour {
    Succeed { exit_code: i32, stdout: String, stderr: String },
    Timeout,
    Error(String),
}

/// A mock executor that records every command it was asked to run.
pub struct MockExecutor {
    pub behaviour: MockBehaviour,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockExecutor {
    pub fn succeeding(stdout: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Succeed {
                exit_code: 0,
                stdout: stdout.into(),
                stderr: String::new(),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Succeed {
                exit_code,
                stdout: String::new(),
                stderr: stderr.into(),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            behaviour: MockBehaviour::Timeout,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn run(&self, command: &str, _run_timeout: Option<i64>) -> Result<Output, ExecutorError> {
        self.calls.lock().unwrap().push(command.to_string());

        match &self.behaviour {
            MockBehaviour::Succeed { exit_code, stdout, stderr } => Ok(Output {
                exit_code: *exit_code,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            }),
            MockBehaviour::Timeout => Err(ExecutorError::Timeout),
            MockBehaviour::Error(msg) => Err(ExecutorError::Other(msg.clone())),
        }
    }
}

/// A [`CommandExecutor`] that plays back a scripted sequence of outcomes,
/// one per call, then repeats its last outcome. Used to script the
/// fail-twice-then-succeed scenario without a real subprocess.
pub struct MockSequence {
    outcomes: Mutex<Vec<MockBehaviour>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSequence {
    pub fn new(outcomes: Vec<MockBehaviour>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandExecutor for MockSequence {
    async fn run(&self, command: &str, _run_timeout: Option<i64>) -> Result<Output, ExecutorError> {
        self.calls.lock().unwrap().push(command.to_string());

        let mut outcomes = self.outcomes.lock().unwrap();
        let next = if outcomes.len() > 1 {
            outcomes.remove(0)
        } else {
            match outcomes.first() {
                Some(MockBehaviour::Succeed { exit_code, stdout, stderr }) => {
                    MockBehaviour::Succeed { exit_code: *exit_code, stdout: stdout.clone(), stderr: stderr.clone() }
                }
                Some(MockBehaviour::Timeout) => MockBehaviour::Timeout,
                Some(MockBehaviour::Error(msg)) => MockBehaviour::Error(msg.clone()),
                None => MockBehaviour::Error("mock sequence exhausted".into()),
            }
        };

        match next {
            MockBehaviour::Succeed { exit_code, stdout, stderr } => Ok(Output { exit_code, stdout, stderr }),
            MockBehaviour::Timeout => Err(ExecutorError::Timeout),
            MockBehaviour::Error(msg) => Err(ExecutorError::Other(msg)),
        }
    }
}
