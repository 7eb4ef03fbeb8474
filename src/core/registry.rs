//! # Task registry - per-task listener multiplexing.
//!
//! The registry maps task ids to interested listeners and routes every inbound
//! [`TaskEvent`] to them. It lives independently of the connection, so
//! registrations survive reconnects.
//!
//! ## Architecture
//! ```text
//! dispatch(ev)
//!   ├─► globals (insertion order)          ─► ListenerWorker::deliver (try_send)
//!   ├─► tasks[ev.task_id] (insertion order) ─► ListenerWorker::deliver (try_send)
//!   └─► ev terminal? ─► remove tasks[ev.task_id], remember id as finished
//! ```
//!
//! ## Rules
//! - Dispatch order is **global listeners first, then per-task listeners**
//! - Registrations for the same task id **stack**; each handle removes exactly its own
//! - Dispatch never awaits listener work; overflow drops per listener
//! - Terminal events remove the task's listeners after queueing the event to them
//! - Removed listeners are retired, not aborted: they drain their queue, and
//!   `shutdown()` waits for them along with the live ones
//! - Finished task ids (bounded memory) are not dispatched to per-task listeners
//!   again; subscribing to a finished id clears the mark
//! - Global listeners see every event, including stray ones for finished tasks

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::events::{Bus, TaskEvent};
use crate::listeners::{ChannelListener, Listener, ListenerWorker};

/// Scope label used for global registrations.
const GLOBAL_SCOPE: &str = "*";

/// What a [`SubscriptionHandle`] is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Global,
    Task(String),
}

/// Listener maps guarded by the registry lock.
#[derive(Default)]
struct Inner {
    globals: Vec<ListenerWorker>,
    tasks: HashMap<String, Vec<ListenerWorker>>,
    finished_order: VecDeque<String>,
    finished: HashSet<String>,
    retired: Vec<JoinHandle<()>>,
}

impl Inner {
    /// Closes the queues of removed workers and keeps their joins until they exit.
    fn retire(&mut self, workers: impl IntoIterator<Item = ListenerWorker>) {
        self.retired.retain(|join| !join.is_finished());
        self.retired
            .extend(workers.into_iter().map(ListenerWorker::retire));
    }

    fn mark_finished(&mut self, task_id: &str, memory: usize) {
        if memory == 0 || self.finished.contains(task_id) {
            return;
        }
        self.finished.insert(task_id.to_owned());
        self.finished_order.push_back(task_id.to_owned());
        while self.finished_order.len() > memory {
            if let Some(old) = self.finished_order.pop_front() {
                self.finished.remove(&old);
            }
        }
    }

    fn clear_finished(&mut self, task_id: &str) {
        if self.finished.remove(task_id) {
            self.finished_order.retain(|id| id != task_id);
        }
    }
}

/// Registry of task and global listeners.
pub struct TaskRegistry {
    inner: RwLock<Inner>,
    bus: Bus,
    queue_capacity: usize,
    finished_memory: usize,
    next_id: AtomicU64,
}

impl TaskRegistry {
    /// Creates a registry with the given initial global listeners.
    ///
    /// Spawns one worker per initial listener, so it must be called from within
    /// a tokio runtime.
    pub fn new(
        bus: Bus,
        queue_capacity: usize,
        finished_memory: usize,
        globals: Vec<Arc<dyn Listener>>,
    ) -> Arc<Self> {
        let queue_capacity = queue_capacity.max(1);
        let next_id = AtomicU64::new(1);
        let globals = globals
            .into_iter()
            .map(|l| {
                let id = next_id.fetch_add(1, AtomicOrdering::Relaxed);
                ListenerWorker::spawn(id, l, Arc::from(GLOBAL_SCOPE), queue_capacity, bus.clone())
            })
            .collect();

        Arc::new(Self {
            inner: RwLock::new(Inner {
                globals,
                ..Inner::default()
            }),
            bus,
            queue_capacity,
            finished_memory,
            next_id,
        })
    }

    /// Registers `listener` for every event of `task_id`.
    ///
    /// Clears a previous "finished" mark for `task_id`, so a retried task is
    /// observed again.
    pub async fn subscribe_to_task(
        self: &Arc<Self>,
        task_id: impl Into<String>,
        listener: Arc<dyn Listener>,
    ) -> SubscriptionHandle {
        let task_id = task_id.into();
        let id = self.next_id();
        let worker = ListenerWorker::spawn(
            id,
            listener,
            Arc::from(task_id.as_str()),
            self.queue_capacity,
            self.bus.clone(),
        );

        let mut inner = self.inner.write().await;
        inner.clear_finished(&task_id);
        inner.tasks.entry(task_id.clone()).or_default().push(worker);
        drop(inner);

        tracing::debug!(task_id = %task_id, registration = id, "subscribed to task");
        self.handle(Scope::Task(task_id), id)
    }

    /// Registers a channel for every event of `task_id`.
    ///
    /// Returns the handle and the receiving half; `capacity` bounds the channel.
    pub async fn subscribe_channel(
        self: &Arc<Self>,
        task_id: impl Into<String>,
        capacity: usize,
    ) -> (SubscriptionHandle, mpsc::Receiver<TaskEvent>) {
        let (listener, rx) = ChannelListener::new(capacity, self.bus.clone());
        let handle = self.subscribe_to_task(task_id, Arc::new(listener)).await;
        (handle, rx)
    }

    /// Removes every per-task listener of `task_id`; returns how many were removed.
    ///
    /// Idempotent. Events already queued to the removed listeners are still handled.
    pub async fn unsubscribe_from_task(&self, task_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.tasks.remove(task_id).unwrap_or_default();
        let n = removed.len();
        inner.retire(removed);
        drop(inner);
        if n > 0 {
            tracing::debug!(task_id, removed = n, "unsubscribed from task");
        }
        n
    }

    /// Registers `listener` for every task event.
    pub async fn add_global_listener(self: &Arc<Self>, listener: Arc<dyn Listener>) -> SubscriptionHandle {
        let id = self.next_id();
        let worker = ListenerWorker::spawn(
            id,
            listener,
            Arc::from(GLOBAL_SCOPE),
            self.queue_capacity,
            self.bus.clone(),
        );
        self.inner.write().await.globals.push(worker);
        self.handle(Scope::Global, id)
    }

    /// Routes one event to its listeners; returns the number of queues it reached.
    pub async fn dispatch(&self, event: TaskEvent) -> usize {
        let ev = Arc::new(event);

        if ev.is_terminal() {
            let mut inner = self.inner.write().await;
            let mut delivered = deliver_all(&inner.globals, &ev);
            if let Some(workers) = inner.tasks.remove(&ev.task_id) {
                delivered += deliver_all(&workers, &ev);
                inner.retire(workers);
            }
            inner.mark_finished(&ev.task_id, self.finished_memory);
            return delivered;
        }

        let inner = self.inner.read().await;
        let mut delivered = deliver_all(&inner.globals, &ev);
        if inner.finished.contains(&ev.task_id) {
            tracing::debug!(
                task_id = %ev.task_id,
                status = %ev.raw_status,
                "ignoring update for finished task"
            );
            return delivered;
        }
        if let Some(workers) = inner.tasks.get(&ev.task_id) {
            delivered += deliver_all(workers, &ev);
        }
        delivered
    }

    /// Number of per-task registrations for `task_id`.
    pub async fn task_listener_count(&self, task_id: &str) -> usize {
        self.inner.read().await.tasks.get(task_id).map_or(0, Vec::len)
    }

    /// Number of global registrations.
    pub async fn global_listener_count(&self) -> usize {
        self.inner.read().await.globals.len()
    }

    /// Task ids that currently have at least one listener (sorted).
    pub async fn subscribed_tasks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().await.tasks.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// True if a terminal event for `task_id` was dispatched and not yet forgotten.
    pub async fn is_finished(&self, task_id: &str) -> bool {
        self.inner.read().await.finished.contains(task_id)
    }

    /// Removes every registration and waits for queued events to be handled,
    /// including those of listeners already removed by a terminal event or an
    /// unsubscribe.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        let globals = std::mem::take(&mut inner.globals);
        let tasks = std::mem::take(&mut inner.tasks);
        let retired = std::mem::take(&mut inner.retired);
        drop(inner);

        for worker in globals.into_iter().chain(tasks.into_values().flatten()) {
            worker.shutdown().await;
        }
        for join in retired {
            let _ = join.await;
        }
    }

    async fn remove(&self, scope: &Scope, id: u64) -> bool {
        let mut inner = self.inner.write().await;
        let removed = match scope {
            Scope::Global => take_by_id(&mut inner.globals, id),
            Scope::Task(task_id) => {
                let Some(workers) = inner.tasks.get_mut(task_id) else {
                    return false;
                };
                let removed = take_by_id(workers, id);
                if workers.is_empty() {
                    inner.tasks.remove(task_id);
                }
                removed
            }
        };
        match removed {
            Some(worker) => {
                inner.retire([worker]);
                true
            }
            None => false,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, AtomicOrdering::Relaxed)
    }

    fn handle(self: &Arc<Self>, scope: Scope, id: u64) -> SubscriptionHandle {
        SubscriptionHandle {
            registry: Arc::downgrade(self),
            scope,
            id,
        }
    }
}

fn deliver_all(workers: &[ListenerWorker], ev: &Arc<TaskEvent>) -> usize {
    workers.iter().filter(|w| w.deliver(ev)).count()
}

fn take_by_id(workers: &mut Vec<ListenerWorker>, id: u64) -> Option<ListenerWorker> {
    let pos = workers.iter().position(|w| w.id() == id)?;
    Some(workers.remove(pos))
}

/// Removes exactly one registration.
///
/// Dropping the handle does **not** unsubscribe; call [`SubscriptionHandle::unsubscribe`].
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    registry: Weak<TaskRegistry>,
    scope: Scope,
    id: u64,
}

impl SubscriptionHandle {
    /// Task id of a per-task registration (`None` for global ones).
    pub fn task_id(&self) -> Option<&str> {
        match &self.scope {
            Scope::Global => None,
            Scope::Task(id) => Some(id),
        }
    }

    /// Registration id, unique within a registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes this registration; returns `false` if it was already gone.
    pub async fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.scope, self.id).await,
            None => false,
        }
    }
}
