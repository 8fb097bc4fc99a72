//! @ai:module:intent Per-provider rate-limit window bookkeeping
//! @ai:module:layer domain
//! @ai:module:public_api RateLimitState, WindowPolicy
//! @ai:module:stateless false

use crate::request::MAX_RETRY_AFTER;
use std::time::Duration;
use tokio::time::Instant;

/// @ai:intent Size and budget of a provider window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub window: Duration,
    /// Calls allowed per window before the provider is held back; 1 means one call per window
    pub requests_per_window: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            requests_per_window: 1,
        }
    }
}

/// @ai:intent Fixed-window counter for one provider
/// @ai:invariant reset_at never moves backwards
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    count: u32,
    window_start: Option<Instant>,
    reset_at: Option<Instant>,
}

impl RateLimitState {
    /// @ai:intent Create a state with no window open
    /// @ai:effects pure
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> Option<Instant> {
        self.window_start
    }

    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    /// @ai:intent Whether a window is open and has not yet elapsed
    /// @ai:effects pure
    pub fn is_open(&self, now: Instant) -> bool {
        self.reset_at.is_some_and(|reset| now < reset)
    }

    /// @ai:intent Count a successful call, opening a fresh window when none is running
    /// @ai:effects state:write
    pub fn record_success(&mut self, now: Instant, policy: &WindowPolicy) {
        if self.is_open(now) {
            self.count = self.count.saturating_add(1);
            return;
        }

        self.count = 1;
        self.window_start = Some(now);
        self.reset_at = Some(hold_until(now, policy.window));
    }

    /// @ai:intent Saturate the window after an upstream rate-limit signal
    /// @ai:effects state:write
    pub fn record_rate_limit(
        &mut self,
        now: Instant,
        retry_after: Option<Duration>,
        policy: &WindowPolicy,
    ) {
        let target = hold_until(now, retry_after.unwrap_or(policy.window));

        if self.is_open(now) {
            self.reset_at = self.reset_at.max(Some(target));
        } else {
            self.window_start = Some(now);
            self.reset_at = Some(target.max(self.reset_at.unwrap_or(target)));
        }
        self.count = self.count.max(policy.requests_per_window.max(1));
    }

    /// @ai:intent When the provider's budget is spent, the instant at which it frees up
    /// @ai:effects pure
    pub fn blocked_until(&self, now: Instant, policy: &WindowPolicy) -> Option<Instant> {
        match self.reset_at {
            Some(reset) if now < reset && self.count >= policy.requests_per_window.max(1) => {
                Some(reset)
            }
            _ => None,
        }
    }
}

/// Reset instant for a hold, clamped to MAX_RETRY_AFTER
fn hold_until(now: Instant, hold: Duration) -> Instant {
    now.checked_add(hold.min(MAX_RETRY_AFTER)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_state_is_unblocked() {
        let state = RateLimitState::new();
        let now = Instant::now();
        assert!(!state.is_open(now));
        assert_eq!(state.blocked_until(now, &WindowPolicy::default()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_opens_one_call_window() {
        let policy = WindowPolicy::default();
        let mut state = RateLimitState::new();
        let now = Instant::now();

        state.record_success(now, &policy);

        assert_eq!(state.count(), 1);
        assert_eq!(state.window_start(), Some(now));
        assert_eq!(state.blocked_until(now, &policy), Some(now + Duration::from_secs(60)));
        assert_eq!(state.blocked_until(now + Duration::from_secs(60), &policy), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_within_window_and_reopens_after() {
        let policy = WindowPolicy {
            window: Duration::from_secs(60),
            requests_per_window: 3,
        };
        let mut state = RateLimitState::new();
        let start = Instant::now();

        state.record_success(start, &policy);
        state.record_success(start + Duration::from_secs(1), &policy);
        assert_eq!(state.count(), 2);
        assert_eq!(state.blocked_until(start + Duration::from_secs(2), &policy), None);

        state.record_success(start + Duration::from_secs(2), &policy);
        assert!(state.blocked_until(start + Duration::from_secs(3), &policy).is_some());

        let later = start + Duration::from_secs(61);
        state.record_success(later, &policy);
        assert_eq!(state.count(), 1);
        assert_eq!(state.reset_at(), Some(later + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_signal_blocks_for_hint() {
        let policy = WindowPolicy {
            window: Duration::from_secs(60),
            requests_per_window: 5,
        };
        let mut state = RateLimitState::new();
        let now = Instant::now();

        state.record_rate_limit(now, Some(Duration::from_secs(10)), &policy);

        assert_eq!(state.blocked_until(now, &policy), Some(now + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_never_moves_backwards() {
        let policy = WindowPolicy::default();
        let mut state = RateLimitState::new();
        let now = Instant::now();

        state.record_success(now, &policy);
        let first_reset = state.reset_at();
        state.record_rate_limit(now + Duration::from_secs(5), Some(Duration::from_secs(1)), &policy);

        assert_eq!(state.reset_at(), first_reset);

        state.record_rate_limit(now + Duration::from_secs(5), Some(Duration::from_secs(120)), &policy);
        assert_eq!(state.reset_at(), Some(now + Duration::from_secs(125)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_hint_is_clamped() {
        let policy = WindowPolicy::default();
        let mut state = RateLimitState::new();
        let now = Instant::now();

        state.record_rate_limit(now, Some(Duration::from_secs(u64::MAX / 2)), &policy);
        assert_eq!(state.blocked_until(now, &policy), Some(now + MAX_RETRY_AFTER));

        let huge_window = WindowPolicy {
            window: Duration::MAX,
            requests_per_window: 1,
        };
        let mut state = RateLimitState::new();
        state.record_success(now, &huge_window);
        assert_eq!(state.reset_at(), Some(now + MAX_RETRY_AFTER));
    }
}
