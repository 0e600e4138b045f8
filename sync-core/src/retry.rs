//! Retry policy for undelivered commands.
//!
//! Every failed dispatch bumps the command's `attempts`. The policy decides
//! two things from that counter:
//! - whether the command has failed permanently and should be abandoned
//! - how long an automatic retrier should wait before the next flush
//!
//! The default policy never abandons a command, and nothing retries
//! automatically unless the client opts in.

use std::time::Duration;

/// Upper bound on the exponent used for backoff, to keep `2^n` in range.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Max-attempts and backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after which a command is abandoned. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay for the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Maximum random jitter added on top of the delay.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Policy that keeps failed commands queued forever.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(1000),
        }
    }

    /// Abandon a command after `attempts` failed deliveries.
    ///
    /// Zero is treated as one: a command always gets at least one try.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Set base and maximum backoff delays.
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max.max(base);
        self
    }

    /// Set the maximum random jitter.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Whether a command with this many failed attempts should be dropped.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay before retry number `attempt` (1-based), with jitter.
    ///
    /// Formula: min(max_delay, base_delay * 2^(attempt - 1)) + random(0..=max_jitter)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt) + random_jitter(self.max_jitter)
    }

    /// The exponential part of [`backoff`](Self::backoff), without jitter.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Random duration in `0..=max`, millisecond resolution.
///
/// Falls back to no jitter if the OS random source is unavailable.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    let random = u64::from_le_bytes(bytes);
    Duration::from_millis(random % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_never_exhausts() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(u32::MAX));
    }

    #[test]
    fn max_attempts_exhausts_at_limit() {
        let policy = RetryPolicy::unbounded().with_max_attempts(3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }

    #[test]
    fn zero_max_attempts_still_allows_one_try() {
        let policy = RetryPolicy::unbounded().with_max_attempts(0);
        assert_eq!(policy.max_attempts, Some(1));
        assert!(!policy.is_exhausted(0));
        assert!(policy.is_exhausted(1));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::unbounded()
            .with_delays(Duration::from_secs(1), Duration::from_secs(60))
            .with_jitter(Duration::ZERO);

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn backoff_capped_at_max_delay_plus_jitter() {
        let policy = RetryPolicy::unbounded();

        // Even with high attempt count, base should be capped at 30s
        let delay = policy.backoff(50);

        assert!(
            delay <= Duration::from_secs(31),
            "delay must be capped at ~31s (30s base + 1s jitter), got {:?}",
            delay
        );
        assert!(delay >= Duration::from_secs(30));
    }

    #[test]
    fn attempt_zero_uses_base_delay() {
        let policy = RetryPolicy::unbounded().with_jitter(Duration::ZERO);
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
    }

    #[test]
    fn max_delay_never_below_base() {
        let policy =
            RetryPolicy::unbounded().with_delays(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn jitter_creates_variance() {
        let policy = RetryPolicy::unbounded().with_jitter(Duration::from_millis(5000));

        let delays: Vec<Duration> = (0..20).map(|_| policy.backoff(3)).collect();
        let min = delays.iter().min().unwrap();
        let max = delays.iter().max().unwrap();

        // Probabilistic: 20 samples over 5001 jitter values
        assert!(
            max.as_millis() - min.as_millis() >= 100,
            "Expected jitter variance, got min={:?} max={:?}",
            min,
            max
        );
    }

    #[test]
    fn jitter_stays_within_bound() {
        for _ in 0..50 {
            assert!(random_jitter(Duration::from_millis(10)) <= Duration::from_millis(10));
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }
}
