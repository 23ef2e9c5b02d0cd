// Retry budget and backoff policy

use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-dispatch the same entry after the given backoff delay
    Retry(Duration),
    /// Budget spent; resolve the entry with a terminal error
    Exhausted,
}

/// Retry policy for transient delivery failures
///
/// Classification is the transport's job (`TransportError::is_retryable`);
/// this policy only manages the budget and the exponential backoff curve.
/// Non-retryable failures never reach it.
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Decide whether a just-failed attempt earns another dispatch
    ///
    /// `attempts` is the entry's counter after the failed attempt was added.
    /// Backoff formula: `base_backoff * 2^(attempts - 1)`, so the first retry
    /// waits one base interval and each further retry doubles it.
    pub fn assess(&self, attempts: u32) -> RetryDecision {
        if attempts > self.max_retries {
            warn!(
                attempts = attempts,
                max_retries = self.max_retries,
                "Retry budget exhausted"
            );
            return RetryDecision::Exhausted;
        }

        let delay = self.base_backoff * 2u32.saturating_pow(attempts.saturating_sub(1));
        info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Scheduling retry");
        RetryDecision::Retry(delay)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        assert_eq!(policy.assess(1), RetryDecision::Retry(Duration::from_secs(1)));
        assert_eq!(policy.assess(2), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(policy.assess(3), RetryDecision::Retry(Duration::from_secs(4)));
    }

    #[test]
    fn budget_allows_max_retries_plus_one_attempts() {
        // max_retries = 2 means three total dispatch attempts: the original
        // plus two retries.
        let policy = RetryPolicy::new(2, Duration::from_secs(1));

        assert!(matches!(policy.assess(1), RetryDecision::Retry(_)));
        assert!(matches!(policy.assess(2), RetryDecision::Retry(_)));
        assert_eq!(policy.assess(3), RetryDecision::Exhausted);
    }

    #[test]
    fn zero_budget_fails_after_first_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100));
        assert_eq!(policy.assess(1), RetryDecision::Exhausted);
    }
}
