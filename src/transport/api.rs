//! # Task HTTP API.
//!
//! Request/response side of the task server:
//!
//! ```text
//! POST {base}/api/tts             body: AudioRequest         header: X-Client-ID
//! POST {base}/api/tts/retry       body: {taskId, ...request} header: X-Client-ID
//! GET  {base}/api/tts/task/{id}
//!
//! response: { success, data?: { taskId?, audio_url?, status?, message?, cached? }, error? }
//! ```
//!
//! [`TaskApi`] is the seam the adapter talks to; [`HttpTaskApi`] is the
//! `reqwest` implementation. Error statuses still carry the JSON envelope, so
//! bodies are decoded regardless of the HTTP status.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::ClientError;
use crate::events::TaskEvent;

/// Header carrying the push channel's client id.
pub const CLIENT_ID_HEADER: &str = "X-Client-ID";

/// Speech generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioRequest {
    /// Voice template.
    #[serde(rename = "templateId")]
    pub template_id: String,
    /// Text to speak.
    pub tts_text: String,
    /// Free-form delivery instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    /// Generation mode understood by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Account the request is billed to.
    pub email: String,
}

impl AudioRequest {
    /// Creates a request with the required fields.
    pub fn new(
        template_id: impl Into<String>,
        tts_text: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            tts_text: tts_text.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Sets the delivery instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Sets the generation mode.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

#[derive(Serialize)]
struct RetryBody<'a> {
    #[serde(rename = "taskId")]
    task_id: &'a str,
    #[serde(flatten)]
    request: &'a AudioRequest,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    /// Whether the server accepted the request.
    #[serde(default)]
    pub success: bool,
    /// Payload on success.
    #[serde(default)]
    pub data: Option<TaskData>,
    /// Error message on failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiResponse {
    /// Returns the payload, or [`ClientError::Rejected`] if the server refused.
    ///
    /// `action` names the request in the fallback message.
    pub fn into_data(self, action: &str) -> Result<TaskData, ClientError> {
        if !self.success {
            let reason = self
                .error
                .unwrap_or_else(|| format!("failed to {action}"));
            return Err(ClientError::Rejected { reason });
        }
        self.data.ok_or_else(|| ClientError::Decode {
            reason: format!("{action}: response without data"),
        })
    }
}

/// Task information returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskData {
    /// Task identifier.
    #[serde(default, rename = "taskId", alias = "task_id")]
    pub task_id: Option<String>,
    /// Finished audio location (cache hits return it immediately).
    #[serde(default, alias = "audioUrl")]
    pub audio_url: Option<String>,
    /// Raw task status.
    #[serde(default)]
    pub status: Option<String>,
    /// Progress or result message.
    #[serde(default)]
    pub message: Option<String>,
    /// True when the audio came from the server cache.
    #[serde(default)]
    pub cached: bool,
    /// Failure description.
    #[serde(default)]
    pub error: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskData {
    /// Converts a status snapshot into a [`TaskEvent`] for `task_id`.
    ///
    /// Returns `None` if the snapshot carries no status.
    pub fn to_event(&self, task_id: &str) -> Option<TaskEvent> {
        let status = self.status.as_deref()?;
        let mut ev = TaskEvent::new(task_id, status);
        ev.message = self.message.clone();
        ev.error = self.error.clone();
        ev.output = self.audio_url.clone().or_else(|| {
            self.extra
                .get("output")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
        ev.payload = self.extra.clone();
        Some(ev)
    }
}

/// Request/response operations of the task server.
#[async_trait]
pub trait TaskApi: Send + Sync + 'static {
    /// Submits a new generation request.
    async fn submit(
        &self,
        request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError>;

    /// Re-runs a previously submitted task.
    async fn retry(
        &self,
        task_id: &str,
        request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError>;

    /// Fetches the current status of a task.
    async fn status(&self, task_id: &str) -> Result<ApiResponse, ClientError>;
}

/// `reqwest` implementation of [`TaskApi`].
#[derive(Clone, Debug)]
pub struct HttpTaskApi {
    http: reqwest::Client,
    submit_url: String,
    retry_url: String,
    status_url: String,
    timeout: Option<Duration>,
}

impl HttpTaskApi {
    /// Creates the API client for `cfg.base_url`.
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            http,
            submit_url: cfg.endpoint("/api/tts"),
            retry_url: cfg.endpoint("/api/tts/retry"),
            status_url: cfg.endpoint("/api/tts/task"),
            timeout: Some(cfg.request_timeout).filter(|d| !d.is_zero()),
        }
    }

    fn prepare(
        &self,
        req: reqwest::RequestBuilder,
        client_id: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let req = req.header(reqwest::header::ACCEPT, "application/json");
        let req = match client_id {
            Some(id) => req.header(CLIENT_ID_HEADER, id),
            None => req,
        };
        match self.timeout {
            Some(t) => req.timeout(t),
            None => req,
        }
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn submit(
        &self,
        request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let req = self.prepare(self.http.post(&self.submit_url).json(request), client_id);
        read_envelope(req.send().await?).await
    }

    async fn retry(
        &self,
        task_id: &str,
        request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let body = RetryBody { task_id, request };
        let req = self.prepare(self.http.post(&self.retry_url).json(&body), client_id);
        read_envelope(req.send().await?).await
    }

    async fn status(&self, task_id: &str) -> Result<ApiResponse, ClientError> {
        let url = format!("{}/{}", self.status_url, task_id);
        let req = self.prepare(self.http.get(url), None);
        read_envelope(req.send().await?).await
    }
}

async fn read_envelope(resp: reqwest::Response) -> Result<ApiResponse, ClientError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    match serde_json::from_slice::<ApiResponse>(&body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(ClientError::Http {
            reason: format!("server returned {status}"),
        }),
        Err(err) => Err(err.into()),
    }
}
