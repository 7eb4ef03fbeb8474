//! # Delay policy between connection attempts.
//!
//! [`BackoffPolicy`] computes how long the client waits before the next
//! connection attempt: a constant `delay`, optionally jittered.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use cradle_link::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy::fixed(Duration::from_secs(3));
//! assert_eq!(backoff.next(0), Duration::from_secs(3));
//! assert_eq!(backoff.next(7), Duration::from_secs(3));
//!
//! let jittered = backoff.with_jitter(JitterPolicy::Equal);
//! assert!(jittered.next(0) >= Duration::from_millis(1500));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before every retry.
    pub delay: Duration,
    /// Randomization applied to `delay`.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Fixed 3s delay, no jitter.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(3))
    }
}

impl BackoffPolicy {
    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with a different jitter policy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay for retry number `retry` (0-indexed).
    ///
    /// Jitter is drawn afresh each time and never feeds back into later delays.
    pub fn next(&self, _retry: u32) -> Duration {
        self.jitter.apply(self.delay)
    }
}
