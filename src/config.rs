//! # Client configuration.
//!
//! Provides [`Config`], the centralized settings for the task client.
//!
//! Config is used in two ways:
//! 1. **Client creation**: `ClientBuilder::new(config).build()`
//! 2. **Per-call defaults**: the adapter's default task timeout
//!
//! ## Sentinel values
//! - `task_timeout = 0s` → wait for a terminal event indefinitely
//! - `connect_timeout = 0s` → no handshake bound
//! - `max_reconnect_attempts = 0` → no connection attempt is ever made

use std::time::Duration;

use crate::policies::{BackoffPolicy, JitterPolicy, ReconnectPolicy};

/// Default task server.
pub const DEFAULT_BASE_URL: &str = "https://tts.cradleintro.top";

/// Configuration for the task client.
///
/// ## Field semantics
/// - `base_url`: server root; `/events`, `/api/tts`, ... are appended
/// - `reconnect_delay`: fixed wait between connection attempts
/// - `max_reconnect_attempts`: total attempts per connect cycle
/// - `jitter`: randomization of `reconnect_delay`
/// - `connect_timeout`: bound on opening the push channel and its handshake
/// - `request_timeout`: bound on each HTTP API request
/// - `task_timeout`: default wait for a terminal task event (`0s` = unbounded)
/// - `bus_capacity`: lifecycle event ring buffer (min 1)
/// - `listener_queue_capacity`: per-listener queue size (min 1)
/// - `finished_task_memory`: how many finished task ids are remembered to
///   suppress stray events after a terminal one
#[derive(Clone, Debug)]
pub struct Config {
    /// Task server root URL.
    pub base_url: String,

    /// Delay between consecutive connection attempts.
    pub reconnect_delay: Duration,

    /// Total connection attempts per connect cycle.
    ///
    /// Applies to explicit `connect()` and to automatic reconnection after
    /// the server drops the channel.
    pub max_reconnect_attempts: u32,

    /// Jitter applied to `reconnect_delay`.
    pub jitter: JitterPolicy,

    /// Bound on opening the push channel (request + `connected` handshake).
    pub connect_timeout: Duration,

    /// Bound on each HTTP API request.
    pub request_timeout: Duration,

    /// Default wait for a terminal task event.
    pub task_timeout: Duration,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// Capacity of each listener's queue.
    ///
    /// When a listener falls this far behind, further events are dropped for
    /// that listener only and `ListenerOverflow` is published.
    pub listener_queue_capacity: usize,

    /// Number of finished task ids remembered by the registry.
    pub finished_task_memory: usize,
}

impl Config {
    /// Returns a copy pointing at another server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds the reconnect policy from `reconnect_delay`, `max_reconnect_attempts` and `jitter`.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            backoff: BackoffPolicy::fixed(self.reconnect_delay).with_jitter(self.jitter),
        }
    }

    /// Returns the default task timeout as an `Option` (`None` = unbounded).
    #[inline]
    pub fn default_task_timeout(&self) -> Option<Duration> {
        Some(self.task_timeout).filter(|d| !d.is_zero())
    }

    /// Returns the handshake bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn connect_timeout_opt(&self) -> Option<Duration> {
        Some(self.connect_timeout).filter(|d| !d.is_zero())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a listener queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn listener_queue_capacity_clamped(&self) -> usize {
        self.listener_queue_capacity.max(1)
    }

    /// Joins `path` onto `base_url` with exactly one slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `base_url = https://tts.cradleintro.top`
    /// - `reconnect_delay = 3s`, `max_reconnect_attempts = 5`, no jitter
    /// - `connect_timeout = 10s`, `request_timeout = 30s`
    /// - `task_timeout = 120s`
    /// - `bus_capacity = 256`, `listener_queue_capacity = 1024`
    /// - `finished_task_memory = 1024`
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            jitter: JitterPolicy::None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            task_timeout: Duration::from_secs(120),
            bus_capacity: 256,
            listener_queue_capacity: 1024,
            finished_task_memory: 1024,
        }
    }
}
