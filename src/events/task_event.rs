//! # Task updates pushed by the server.
//!
//! A [`TaskEvent`] is one `task_update` frame from the push channel, decoded
//! and tagged with a client-side receive sequence number. Events are transient:
//! they are dispatched once to the interested listeners and dropped.
//!
//! The server speaks a richer status vocabulary than callers need;
//! [`TaskStatus::classify`] folds it into four states:
//!
//! ```text
//! queued                                   → Queued
//! succeeded | completed | cache_hit        → Succeeded  (terminal)
//! failed | queue_timeout | canceled        → Failed     (terminal)
//! started | template_loaded | dequeued ... → Running
//! ```
//!
//! ## Example
//! ```rust
//! use cradle_link::{TaskEvent, TaskStatus};
//!
//! let ev = TaskEvent::new("t-42", "failed").with_error("voice template missing");
//! assert_eq!(ev.status, TaskStatus::Failed);
//! assert!(ev.is_terminal());
//! assert_eq!(ev.failure_reason(), "voice template missing");
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde_json::{Map, Value};

/// Receive counter shared by all task events.
static TASK_EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Coarse lifecycle state of a server task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Accepted, waiting for capacity.
    Queued,
    /// Being processed.
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished without a result.
    Failed,
}

impl TaskStatus {
    /// Folds a raw server status into a [`TaskStatus`].
    ///
    /// Unknown statuses are treated as [`TaskStatus::Running`] (non-terminal).
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => TaskStatus::Queued,
            "succeeded" | "completed" | "cache_hit" => TaskStatus::Succeeded,
            "failed" | "queue_timeout" | "canceled" | "cancelled" => TaskStatus::Failed,
            _ => TaskStatus::Running,
        }
    }

    /// True for `Succeeded` and `Failed`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }
}

/// One task update.
///
/// - `seq`: client-side receive order (monotonic across all tasks)
/// - `status`: classified state; `raw_status` keeps the server's word
/// - `payload`: every other field of the frame, untouched
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    /// Monotonic receive sequence number.
    pub seq: u64,
    /// Wall-clock receive time.
    pub at: SystemTime,
    /// Server task identifier.
    pub task_id: String,
    /// Classified status.
    pub status: TaskStatus,
    /// Status exactly as sent by the server.
    pub raw_status: String,
    /// Human-readable progress message.
    pub message: Option<String>,
    /// Failure description (usually set with `failed`).
    pub error: Option<String>,
    /// Progress indicator as sent by the server.
    pub progress: Option<f64>,
    /// Result location (`output` / `audioUrl`).
    pub output: Option<String>,
    /// Remaining fields of the frame.
    pub payload: Map<String, Value>,
}

impl TaskEvent {
    /// Creates an event for `task_id` with the raw server status `status`.
    pub fn new(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        let raw_status = status.into();
        Self {
            seq: TASK_EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            task_id: task_id.into(),
            status: TaskStatus::classify(&raw_status),
            raw_status,
            message: None,
            error: None,
            progress: None,
            output: None,
            payload: Map::new(),
        }
    }

    /// Attaches a progress message.
    #[inline]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches a failure description.
    #[inline]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a progress value.
    #[inline]
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attaches the result location.
    #[inline]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Adds an extra payload field.
    #[inline]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// True if no further events are expected for this task.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Best description of why the task failed.
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| format!("task ended with status '{}'", self.raw_status))
    }

    /// Audio location if the server reported one.
    pub fn audio_url(&self) -> Option<&str> {
        self.output.as_deref().or_else(|| {
            ["audioUrl", "audio_url"]
                .iter()
                .find_map(|key| self.payload.get(*key).and_then(Value::as_str))
        })
    }
}
