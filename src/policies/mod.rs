//! Reconnect policies.
//!
//! This module groups the knobs that control **if** the client makes another
//! connection attempt and **how long** it waits before it.
//!
//! ## Contents
//! - [`ReconnectPolicy`] bounded attempt count per connect cycle
//! - [`BackoffPolicy`]   the fixed delay between attempts, plus jitter
//! - [`JitterPolicy`]    randomization to avoid synchronized reconnects
//!
//! ## Quick wiring
//! ```text
//! Config { reconnect_delay, max_reconnect_attempts, jitter }
//!      └─► Config::reconnect_policy() ─► TransportClient uses:
//!           - policy.allows(attempt) to decide continue/give up
//!           - policy.delay_after(attempt) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - five attempts, fixed 3s apart, no jitter.

mod backoff;
mod jitter;
mod reconnect;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use reconnect::ReconnectPolicy;
