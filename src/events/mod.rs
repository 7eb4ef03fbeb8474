//! Events: task updates and client lifecycle.
//!
//! ## Contents
//! - [`TaskEvent`], [`TaskStatus`] server task updates, dispatched by the registry
//! - [`Event`], [`EventKind`] client lifecycle events
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast` for lifecycle events
//!
//! ## Quick reference
//! - **TaskEvent producers**: the transport read loop (decoded `task_update` frames).
//! - **TaskEvent consumers**: per-task and global listeners via `TaskRegistry`.
//! - **Event producers**: `TransportClient`, listener workers, `TtsAdapter`.
//! - **Event consumers**: anyone holding `TransportClient::subscribe_events()`.

mod bus;
mod event;
mod task_event;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub use task_event::{TaskEvent, TaskStatus};
