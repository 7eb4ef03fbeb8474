//! # LogWriter: task update logger
//!
//! A minimal listener that writes every [`TaskEvent`] through `tracing`.
//! Register it globally for tests, demos or field debugging.
//!
//! ## Example output
//! ```text
//! INFO [queued] task="8f0c..."
//! INFO [running] task="8f0c..." raw="template_loaded" message="loading voice"
//! INFO [succeeded] task="8f0c..." output="https://cdn/8f0c.wav"
//! WARN [failed] task="8f0c..." error="voice template missing"
//! ```

use async_trait::async_trait;

use crate::events::{TaskEvent, TaskStatus};
use crate::listeners::Listener;

/// Task update writer listener.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listener for LogWriter {
    async fn on_event(&self, e: &TaskEvent) {
        match e.status {
            TaskStatus::Queued => {
                tracing::info!(task = %e.task_id, "[queued]");
            }
            TaskStatus::Running => {
                tracing::info!(
                    task = %e.task_id,
                    raw = %e.raw_status,
                    message = ?e.message,
                    progress = ?e.progress,
                    "[running]"
                );
            }
            TaskStatus::Succeeded => {
                tracing::info!(task = %e.task_id, output = ?e.audio_url(), "[succeeded]");
            }
            TaskStatus::Failed => {
                tracing::warn!(task = %e.task_id, error = %e.failure_reason(), "[failed]");
            }
        }
    }

    fn name(&self) -> &str {
        "LogWriter"
    }
}
