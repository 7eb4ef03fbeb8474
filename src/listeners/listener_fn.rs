//! # Function-backed listener (`ListenerFn`)
//!
//! [`ListenerFn`] wraps a synchronous closure `F: Fn(&TaskEvent)`. It is the
//! quickest way to observe task updates from tests, progress indicators or
//! callback-style code.
//!
//! For async work, implement [`Listener`] directly.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cradle_link::{Listener, ListenerFn, TaskEvent};
//!
//! let l: Arc<dyn Listener> = ListenerFn::arc("printer", |ev: &TaskEvent| {
//!     println!("{} -> {}", ev.task_id, ev.raw_status);
//! });
//!
//! assert_eq!(l.name(), "printer");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::events::TaskEvent;
use crate::listeners::Listener;

/// Closure-backed listener implementation.
pub struct ListenerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ListenerFn<F>
where
    F: Fn(&TaskEvent) + Send + Sync + 'static,
{
    /// Creates a new closure-backed listener.
    ///
    /// Prefer [`ListenerFn::arc`] when you immediately need an `Arc<dyn Listener>`.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F> Listener for ListenerFn<F>
where
    F: Fn(&TaskEvent) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &TaskEvent) {
        (self.f)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
