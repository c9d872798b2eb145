//! Reconnect backoff policy.

use std::time::Duration;

use crate::domain::ChannelId;

/// Exponential backoff with a ceiling and a fixed attempt budget.
///
/// `backoff_for(n) = min(cap, base * 2^n)`, counting attempts from 1, so
/// the defaults (1 s base, 30 s cap) give 2, 4, 8, 16, 30 seconds.
/// Sessions give up once more than `max_attempts` consecutive attempts
/// have failed since the last successful subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Default base delay.
    pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
    /// Default ceiling.
    pub const DEFAULT_CAP: Duration = Duration::from_secs(30);
    /// Default attempt budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a policy.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Returns the wait before reconnect attempt `attempt`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Returns `true` once `attempt` exceeds the attempt budget.
    #[must_use]
    pub const fn should_give_up(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_BASE,
            Self::DEFAULT_CAP,
            Self::DEFAULT_MAX_ATTEMPTS,
        )
    }
}

/// Per-session reconnect bookkeeping.
///
/// Owned by exactly one [`super::SocketSession`]; reset to zero every time
/// the relay confirms a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectAttemptState {
    /// Channel the session is bound to.
    pub channel_id: ChannelId,
    /// Consecutive failed attempts.
    pub attempt_count: u32,
    /// Wait before the next attempt.
    pub next_backoff: Duration,
}

impl ReconnectAttemptState {
    /// Creates a fresh state with no failures.
    #[must_use]
    pub const fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            attempt_count: 0,
            next_backoff: Duration::ZERO,
        }
    }

    /// Records a failure and returns the new attempt number.
    pub fn record_failure(&mut self, policy: &ReconnectPolicy) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.next_backoff = policy.backoff_for(self.attempt_count);
        self.attempt_count
    }

    /// Clears the failure count after a successful subscription.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.next_backoff = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sequence_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        let waits: Vec<u64> = (1..=5).map(|n| policy.backoff_for(n).as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 30]);
    }

    #[test]
    fn gives_up_after_five() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.should_give_up(5));
        assert!(policy.should_give_up(6));
    }

    #[test]
    fn large_attempts_saturate_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff_for(40), Duration::from_secs(30));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn attempt_state_counts_and_resets() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectAttemptState::new(ChannelId::from("42"));
        assert_eq!(state.record_failure(&policy), 1);
        assert_eq!(state.record_failure(&policy), 2);
        assert_eq!(state.next_backoff, Duration::from_secs(4));
        state.reset();
        assert_eq!(state.attempt_count, 0);
        assert_eq!(state.record_failure(&policy), 1);
        assert_eq!(state.next_backoff, Duration::from_secs(2));
    }
}
