//! # Core listener trait
//!
//! `Listener` is the extension point for reacting to [`TaskEvent`]s. Each
//! registration is driven by a dedicated worker loop fed by a bounded queue
//! owned by the [`TaskRegistry`](crate::TaskRegistry).
//!
//! ## Contract
//! - Implementations may be slow (I/O, UI updates, retries); they do **not**
//!   block the transport read loop nor other listeners.
//! - A listener may **declare** its preferred queue capacity via
//!   [`Listener::queue_capacity`]; otherwise the registry default is used.
//!   If a queue overflows, events for that listener are **dropped**.
//! - A panic inside `on_event` is caught and reported; the listener keeps
//!   receiving subsequent events.
//!
//! ## Example (skeleton)
//! ```rust
//! // use cradle_link::{Listener, TaskEvent};
//! //
//! // struct ProgressBar;
//! // #[async_trait::async_trait]
//! // impl Listener for ProgressBar {
//! //     async fn on_event(&self, ev: &TaskEvent) {
//! //         // redraw...
//! //     }
//! //     fn name(&self) -> &str { "progress-bar" }
//! //     fn queue_capacity(&self) -> Option<usize> { Some(64) }
//! // }
//! ```

use async_trait::async_trait;

use crate::events::TaskEvent;

/// Contract for task event listeners.
///
/// Called from a registration-dedicated worker task. Implementations should
/// avoid blocking the async runtime.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle a single task event.
    async fn on_event(&self, event: &TaskEvent);

    /// Human-readable name (for logs and lifecycle events).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this listener's queue (`None` = registry default).
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
