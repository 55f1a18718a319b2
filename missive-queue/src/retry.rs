//! Retry policy for failed sends
//!
//! Backoff follows an ordered delay table rather than an exponential curve:
//! a failure on attempt k schedules the next attempt after
//! `delays[min(k - 1, len - 1)]`, so the last entry repeats once the table
//! is exhausted.

use std::time::{Duration, SystemTime};

/// Retry policy over the configured backoff table
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Build the policy from a delay table in milliseconds.
    ///
    /// An empty table degenerates to a single one-second delay so the
    /// policy can always produce a schedule.
    #[must_use]
    pub fn new(delays_ms: &[u64]) -> Self {
        let delays = if delays_ms.is_empty() {
            vec![Duration::from_secs(1)]
        } else {
            delays_ms.iter().map(|&ms| Duration::from_millis(ms)).collect()
        };

        Self { delays }
    }

    /// Whether another attempt should be made after `attempts` failures
    #[must_use]
    pub const fn should_retry(&self, attempts: u32, max_attempts: u32) -> bool {
        attempts < max_attempts
    }

    /// The backoff delay applied after a failure on attempt `attempt`
    /// (1-indexed)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.delays.len() - 1);
        self.delays[index]
    }

    /// When the next attempt should run after a failure on `attempt`
    #[must_use]
    pub fn next_attempt(&self, attempt: u32, now: SystemTime) -> SystemTime {
        now + self.delay_for(attempt)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_table_lookup() {
        let policy = RetryPolicy::new(&[1_000, 5_000, 15_000]);

        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(5_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(15_000));
    }

    #[test]
    fn test_last_entry_repeats() {
        let policy = RetryPolicy::new(&[1_000, 5_000, 15_000]);

        assert_eq!(policy.delay_for(4), Duration::from_millis(15_000));
        assert_eq!(policy.delay_for(20), Duration::from_millis(15_000));
    }

    #[test]
    fn test_attempt_zero_maps_to_first_entry() {
        let policy = RetryPolicy::new(&[250, 500]);
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
    }

    #[test]
    fn test_should_retry_until_budget_spent() {
        let policy = RetryPolicy::new(&[100]);

        assert!(policy.should_retry(1, 3));
        assert!(policy.should_retry(2, 3));
        assert!(!policy.should_retry(3, 3));
        assert!(!policy.should_retry(4, 3));
    }

    #[test]
    fn test_empty_table_degenerates() {
        let policy = RetryPolicy::new(&[]);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(5), Duration::from_secs(1));
    }

    #[test]
    fn test_next_attempt_offsets_now() {
        let policy = RetryPolicy::new(&[2_000]);
        let now = SystemTime::now();
        let next = policy.next_attempt(1, now);
        assert_eq!(next.duration_since(now).unwrap_or_default().as_millis(), 2_000);
    }
}
