//! # Channel-backed listener.
//!
//! [`ChannelListener`] forwards every event into a bounded `mpsc` channel, so a
//! caller can `recv().await` task updates instead of registering a callback.
//! The adapter uses it to wait for a terminal event.
//!
//! When the receiving side is gone (the caller timed out or gave up), the event
//! is still observed: it is logged and published as
//! [`EventKind::LateTaskEvent`](crate::EventKind::LateTaskEvent).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::{Bus, Event, EventKind, TaskEvent};
use crate::listeners::Listener;

/// Listener that feeds an `mpsc` channel.
pub struct ChannelListener {
    tx: mpsc::Sender<TaskEvent>,
    bus: Bus,
}

impl ChannelListener {
    /// Creates a listener and the receiving half of its channel.
    pub fn new(capacity: usize, bus: Bus) -> (Self, mpsc::Receiver<TaskEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, bus }, rx)
    }
}

#[async_trait]
impl Listener for ChannelListener {
    async fn on_event(&self, event: &TaskEvent) {
        if self.tx.send(event.clone()).await.is_err() {
            tracing::info!(
                task_id = %event.task_id,
                status = %event.raw_status,
                "task update arrived after the caller stopped waiting"
            );
            self.bus.publish(
                Event::new(EventKind::LateTaskEvent)
                    .with_task(event.task_id.as_str())
                    .with_reason(event.raw_status.as_str()),
            );
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
