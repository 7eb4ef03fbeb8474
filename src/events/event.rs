//! # Client lifecycle events.
//!
//! The [`EventKind`] enum classifies what happens to the client itself:
//! - **Connection events**: attempts, handshakes, losses, reconnect scheduling
//! - **Listener events**: panics and queue overflows inside task listeners
//! - **Task bookkeeping**: submissions, caller timeouts, late updates
//!
//! Task updates themselves are [`TaskEvent`](crate::TaskEvent)s and travel
//! through the registry, not through the lifecycle bus.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cradle_link::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled)
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(3))
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.delay_ms, Some(3000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for lifecycle event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of client lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Connection ===
    /// A connection attempt is starting.
    ///
    /// Sets: `attempt`
    Connecting,

    /// The push channel is open and the handshake completed.
    ///
    /// Sets: `client_id` (if the server assigned one), `attempt`
    Connected,

    /// A single connection attempt failed.
    ///
    /// Sets: `attempt`, `reason`
    ConnectFailed,

    /// The next attempt is scheduled.
    ///
    /// Sets: `attempt` (the failed one), `delay_ms`, `reason`
    ReconnectScheduled,

    /// An established channel dropped without being asked to.
    ///
    /// Sets: `reason`
    ConnectionLost,

    /// Every attempt of a cycle failed; the client gave up.
    ///
    /// Sets: `attempt` (total made), `reason`
    ReconnectExhausted,

    /// The channel was closed on request.
    Disconnected,

    // === Listeners ===
    /// A task listener panicked while handling an event.
    ///
    /// Sets: `task` (task id, or `*` for global), `listener`, `reason`
    ListenerPanicked,

    /// An event was dropped for a listener whose queue was full or closed.
    ///
    /// Sets: `task`, `listener`, `reason` (`full` / `closed`)
    ListenerOverflow,

    // === Tasks ===
    /// The server accepted a generation or retry request.
    ///
    /// Sets: `task`
    TaskSubmitted,

    /// A caller stopped waiting for a task.
    ///
    /// Sets: `task`, `timeout_ms`
    TaskTimedOut,

    /// An update arrived for a task whose caller had already given up.
    ///
    /// Sets: `task`, `reason` (the raw status)
    LateTaskEvent,
}

/// Lifecycle event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Attempt number (1-based), for connection events.
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Caller timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Task id the event refers to.
    pub task: Option<Arc<str>>,
    /// Listener name, for listener events.
    pub listener: Option<Arc<str>>,
    /// Server-assigned client id.
    pub client_id: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            task: None,
            listener: None,
            client_id: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a listener name.
    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    /// Attaches the server-assigned client id.
    #[inline]
    pub fn with_client_id(mut self, client_id: impl Into<Arc<str>>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a caller timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Creates a listener overflow event.
    pub fn listener_overflow(task: &str, listener: &str, reason: &'static str) -> Self {
        Event::new(EventKind::ListenerOverflow)
            .with_task(task)
            .with_listener(listener)
            .with_reason(reason)
    }

    /// Creates a listener panic event.
    pub fn listener_panicked(task: &str, listener: &str, info: String) -> Self {
        Event::new(EventKind::ListenerPanicked)
            .with_task(task)
            .with_listener(listener)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
