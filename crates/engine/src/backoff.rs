//! Pure backoff delay computation, unit-testable without a store.
//!
//! `delay = backoff_base ^ attempts`, integer exponentiation, no jitter, no
//! cap — deliberately thin per the project's design notes.

use chrono::Duration;

/// Compute the delay to add to `available_at` after the `attempts`-th
/// failed attempt. `backoff_base` is read from config by the caller and
/// falls back to 2 there if malformed; this function takes it as given.
pub fn delay_for_attempt(backoff_base: u32, attempts: u32) -> Duration {
    let secs = (backoff_base as i64).saturating_pow(attempts);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_two_produces_doubling_delays() {
        assert_eq!(delay_for_attempt(2, 1), Duration::seconds(2));
        assert_eq!(delay_for_attempt(2, 2), Duration::seconds(4));
        assert_eq!(delay_for_attempt(2, 3), Duration::seconds(8));
        assert_eq!(delay_for_attempt(2, 4), Duration::seconds(16));
    }

    #[test]
    fn base_one_produces_constant_delay() {
        assert_eq!(delay_for_attempt(1, 1), Duration::seconds(1));
        assert_eq!(delay_for_attempt(1, 5), Duration::seconds(1));
    }
}
