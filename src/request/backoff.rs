//! @ai:module:intent Exponential backoff with jitter between retry attempts
//! @ai:module:layer domain
//! @ai:module:public_api RetryPolicy
//! @ai:module:stateless true

use rand::Rng;
use std::time::Duration;

/// @ai:intent Delay parameters for the executor's retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// @ai:intent Deterministic part of the delay: min(base * 2^attempt, max)
    /// @ai:effects pure
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// @ai:intent Delay to wait after the failed attempt with the given 0-based index
    /// @ai:post result <= max_delay + jitter
    /// @ai:effects random
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };

        capped + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_exponential_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..4 {
            let lower = Duration::from_secs(1 << attempt);
            let delay = policy.delay(attempt);
            assert!(delay >= lower, "attempt {attempt}: {delay:?} < {lower:?}");
            assert!(delay <= lower + policy.jitter);
        }
    }

    #[test]
    fn test_delay_never_exceeds_cap_plus_jitter() {
        let policy = RetryPolicy::default();
        for attempt in [5, 10, 31, 32, 100, u32::MAX] {
            let delay = policy.delay(attempt);
            assert!(delay >= policy.max_delay);
            assert!(delay <= policy.max_delay + policy.jitter);
        }
    }

    #[test]
    fn test_capped_delay_is_non_decreasing() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..12).map(|i| policy.capped_delay(i)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[4], Duration::from_secs(16));
        assert_eq!(delays[5], Duration::from_secs(30));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }
}
