//! Error types used by the task client and the cradle feed service.
//!
//! This module defines two error enums:
//!
//! - [`ClientError`]: failures of the connection, the task API, or a task itself.
//! - [`FeedError`]: failures of feed intake and character generation.
//!
//! Both provide `as_label` (stable snake_case, for logs/metrics) and `as_message`.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the task client.
///
/// Connection-level errors are retried internally up to the configured bound
/// before they surface. Task-level failures are never retried automatically;
/// retrying is an explicit caller action ([`TtsAdapter::retry_audio`](crate::TtsAdapter::retry_audio)).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The push channel could not be (re)established within the reconnect policy.
    #[error("connection failed after {attempts} attempt(s): {reason}")]
    Connection {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Reason reported by the last attempt.
        reason: String,
    },

    /// No terminal event arrived for the task within the caller's bound.
    #[error("task {task_id} timed out after {timeout:?}")]
    Timeout {
        /// Task the caller was waiting on.
        task_id: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The server reported that the task failed.
    #[error("task {task_id} failed: {reason}")]
    Task {
        /// Failed task.
        task_id: String,
        /// Server-provided reason.
        reason: String,
    },

    /// Operation attempted on a client that cannot serve it.
    #[error("invalid client state: {reason}")]
    InvalidState {
        /// What made the client unusable.
        reason: String,
    },

    /// The server refused the request (`success: false`).
    #[error("request rejected: {reason}")]
    Rejected {
        /// Server-provided error message.
        reason: String,
    },

    /// Transport-level HTTP failure (send error, non-JSON error status).
    #[error("http error: {reason}")]
    Http {
        /// Underlying error message.
        reason: String,
    },

    /// A payload could not be decoded.
    #[error("decode error: {reason}")]
    Decode {
        /// Underlying error message.
        reason: String,
    },
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cradle_link::ClientError;
    /// use std::time::Duration;
    ///
    /// let err = ClientError::Timeout { task_id: "t1".into(), timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Connection { .. } => "connection_failed",
            ClientError::Timeout { .. } => "task_timeout",
            ClientError::Task { .. } => "task_failed",
            ClientError::InvalidState { .. } => "invalid_state",
            ClientError::Rejected { .. } => "request_rejected",
            ClientError::Http { .. } => "http_error",
            ClientError::Decode { .. } => "decode_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ClientError::Connection { attempts, reason } => {
                format!("gave up after {attempts} attempt(s): {reason}")
            }
            ClientError::Timeout { task_id, timeout } => {
                format!("task={task_id} timeout={timeout:?}")
            }
            ClientError::Task { task_id, reason } => format!("task={task_id} reason={reason}"),
            ClientError::InvalidState { reason } => format!("invalid state: {reason}"),
            ClientError::Rejected { reason } => format!("rejected: {reason}"),
            ClientError::Http { reason } => format!("http: {reason}"),
            ClientError::Decode { reason } => format!("decode: {reason}"),
        }
    }

    /// Indicates whether repeating the same operation may succeed.
    ///
    /// Returns `true` for [`ClientError::Connection`], [`ClientError::Timeout`]
    /// and [`ClientError::Http`]. A [`ClientError::Task`] is not retryable here:
    /// the caller decides to re-run it with `retry_audio`.
    ///
    /// # Example
    /// ```
    /// use cradle_link::ClientError;
    ///
    /// let lost = ClientError::Connection { attempts: 3, reason: "refused".into() };
    /// assert!(lost.is_retryable());
    ///
    /// let failed = ClientError::Task { task_id: "t1".into(), reason: "bad voice".into() };
    /// assert!(!failed.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Connection { .. } | ClientError::Timeout { .. } | ClientError::Http { .. }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode {
            reason: err.to_string(),
        }
    }
}

/// # Errors produced by the cradle feed service.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Feed content was empty or whitespace only.
    #[error("feed content must not be empty")]
    EmptyContent,

    /// The downstream character generator failed.
    #[error("character generation failed: {reason}")]
    Generation {
        /// Generator-provided reason.
        reason: String,
    },
}

impl FeedError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FeedError::EmptyContent => "feed_empty_content",
            FeedError::Generation { .. } => "feed_generation_failed",
        }
    }
}
