//! `Clock` — the source of `now` for every store call the engine makes.
//!
//! The `db::JobStore` trait takes `now` as an explicit parameter rather than
//! calling `Utc::now()` internally, so tests can inject arbitrary instants
//! (backoff math, claim eligibility) without sleeping real time.

use chrono::{DateTime, Utc};

/// Supplies the current instant to the queue engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: wall-clock UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for deterministic tests. Advance it explicitly with
/// [`FixedClock::advance`] rather than letting wall-clock time pass.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: std::sync::Mutex::new(instant),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.instant.lock().unwrap();
        *guard = *guard + delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap() = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap()
    }
}
