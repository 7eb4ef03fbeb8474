//! # Broadcast bus for client lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. The transport client, the registry's
//! listener workers and the adapter publish to it; observers (logs, UI status
//! indicators, tests) subscribe.
//!
//! ```text
//! TransportClient ──┐
//! ListenerWorker  ──┼──► Bus ──► receiver 1 (status indicator)
//! TtsAdapter      ──┘        └─► receiver N (test assertions)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded**: a shared ring buffer of `capacity` events; lagging receivers
//!   get `RecvError::Lagged(n)`.
//! - **No persistence**: events published with no receivers are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
