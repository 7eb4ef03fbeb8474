//! # Bounded reconnect policy for the push channel.
//!
//! [`ReconnectPolicy`] decides **whether** another connection attempt may be
//! made and **how long** to wait before it.
//!
//! ```text
//! attempt 1 ──► fail ──► sleep(delay_after(1)) ──► attempt 2 ──► ... ──► attempt max_attempts ──► ConnectionError
//! ```
//!
//! `max_attempts` counts **total** attempts per connect cycle, so a transport
//! that fails `N` times in a row is overcome exactly when `N < max_attempts`.
//! `max_attempts = 0` makes no attempt at all.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Bounded attempts plus the delay between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Total attempts allowed per connect cycle.
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub backoff: BackoffPolicy,
}

impl Default for ReconnectPolicy {
    /// Five attempts, fixed 3s apart.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(3), 5)
    }
}

impl ReconnectPolicy {
    /// `max_attempts` attempts separated by a constant `delay`.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffPolicy::fixed(delay),
        }
    }

    /// True if attempt number `attempt` (1-based) may be made.
    #[inline]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.next(attempt.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_exactly_max_attempts() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10), 3);
        assert!(!policy.allows(0));
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }

    #[test]
    fn zero_attempts_allows_nothing() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10), 0);
        assert!(!policy.allows(1));
    }

    #[test]
    fn fixed_delay_between_attempts() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(750), 4);
        assert_eq!(policy.delay_after(1), Duration::from_millis(750));
        assert_eq!(policy.delay_after(3), Duration::from_millis(750));
    }
}
