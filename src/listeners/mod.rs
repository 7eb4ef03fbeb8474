//! # Task event listeners.
//!
//! This module provides the [`Listener`] trait and the built-in implementations
//! that receive [`TaskEvent`](crate::TaskEvent)s from the
//! [`TaskRegistry`](crate::TaskRegistry).
//!
//! ## Architecture
//! ```text
//! TransportClient read loop ── dispatch(TaskEvent) ──► TaskRegistry
//!                                                        │
//!                          global listeners (insertion order) first,
//!                          then listeners of ev.task_id (insertion order)
//!                                                        │
//!                                ┌───────────────┬───────┴───────┐
//!                                ▼               ▼               ▼
//!                          ListenerWorker  ListenerWorker  ListenerWorker
//!                                ▼               ▼               ▼
//!                           LogWriter      ListenerFn     ChannelListener ──► adapter
//! ```
//!
//! ## Listener types
//! - [`ListenerFn`]: wraps a synchronous closure
//! - [`ChannelListener`]: forwards into an `mpsc` channel (used by the adapter)
//! - `LogWriter` (feature `logging`): writes updates through `tracing`

mod channel;
mod listener;
mod listener_fn;
#[cfg(feature = "logging")]
mod log;
mod worker;

pub use channel::ChannelListener;
pub use listener::Listener;
pub use listener_fn::ListenerFn;
#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use worker::ListenerWorker;
