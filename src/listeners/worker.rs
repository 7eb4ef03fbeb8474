//! # Per-registration delivery worker.
//!
//! Every listener registration gets its own [`ListenerWorker`]: a bounded queue
//! plus a spawned task that drains it into [`Listener::on_event`].
//!
//! ```text
//! deliver(event)
//!     │  try_send (never waits)
//!     ▼
//! [queue, bounded] ──► worker task ──► listener.on_event()
//!                                  └──► panic → ListenerPanicked
//! ```
//!
//! ## Rules
//! - **Per-listener FIFO**: a listener sees events in delivery order
//! - **Overflow**: event dropped for that listener only, `ListenerOverflow` published
//! - **Isolation**: a slow or panicking listener doesn't affect others
//! - **Drain on removal**: dropping the worker closes the queue; events already
//!   queued are still handled before the task exits
//!
//! ## Panic handling
//! `catch_unwind` turns a panic into a `ListenerPanicked` event plus an error
//! log; the worker continues with the next event.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, TaskEvent};
use crate::listeners::Listener;

/// Queue and worker task for one listener registration.
pub(crate) struct ListenerWorker {
    id: u64,
    name: Arc<str>,
    scope: Arc<str>,
    sender: mpsc::Sender<Arc<TaskEvent>>,
    join: JoinHandle<()>,
    bus: Bus,
}

impl ListenerWorker {
    /// Spawns the worker task for `listener`.
    ///
    /// `scope` is the task id the registration belongs to (`*` for global
    /// listeners); it only labels lifecycle events and logs.
    pub(crate) fn spawn(
        id: u64,
        listener: Arc<dyn Listener>,
        scope: Arc<str>,
        default_capacity: usize,
        bus: Bus,
    ) -> Self {
        let cap = listener.queue_capacity().unwrap_or(default_capacity).max(1);
        let name: Arc<str> = Arc::from(listener.name());
        let (sender, mut rx) = mpsc::channel::<Arc<TaskEvent>>(cap);

        let worker_bus = bus.clone();
        let worker_scope = Arc::clone(&scope);
        let worker_name = Arc::clone(&name);
        let join = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = listener.on_event(ev.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    let info = panic_message(&*panic_err);
                    tracing::error!(
                        listener = %worker_name,
                        scope = %worker_scope,
                        task_id = %ev.task_id,
                        panic = %info,
                        "task listener panicked"
                    );
                    worker_bus.publish(Event::listener_panicked(&ev.task_id, &worker_name, info));
                }
            }
        });

        Self {
            id,
            name,
            scope,
            sender,
            join,
            bus,
        }
    }

    /// Registration id.
    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Queues `event` for this listener without waiting.
    ///
    /// Returns `false` (and publishes `ListenerOverflow`) if the event was dropped.
    pub(crate) fn deliver(&self, event: &Arc<TaskEvent>) -> bool {
        match self.sender.try_send(Arc::clone(event)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.overflow(event, "full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.overflow(event, "closed");
                false
            }
        }
    }

    /// Closes the queue and waits until every queued event has been handled.
    pub(crate) async fn shutdown(self) {
        let _ = self.retire().await;
    }

    /// Closes the queue; the worker drains what it holds, then exits.
    ///
    /// The returned handle resolves once the last queued event was handled.
    pub(crate) fn retire(self) -> JoinHandle<()> {
        drop(self.sender);
        self.join
    }

    fn overflow(&self, event: &TaskEvent, reason: &'static str) {
        tracing::warn!(
            listener = %self.name,
            scope = %self.scope,
            task_id = %event.task_id,
            reason,
            "dropping task update for listener"
        );
        self.bus
            .publish(Event::listener_overflow(&event.task_id, &self.name, reason));
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
