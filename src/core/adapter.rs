//! # TtsAdapter: request/response facade over the event layer.
//!
//! Callers submit generation requests and await the outcome; the adapter
//! bridges the HTTP request and the asynchronous terminal task event.
//!
//! ## Flow
//! ```text
//! generate_audio(req)
//!   ├─► ensure_connected()            (auto-connect; InvalidState if never connected)
//!   ├─► POST /api/tts (X-Client-ID)   (Rejected on success=false)
//!   ├─► cached audio_url? ─────────────────────────────► Ok(AudioResult{cached})
//!   ├─► registry.subscribe_channel(task_id)
//!   ├─► GET /api/tts/task/{id}        (already terminal? ─► resolve)
//!   └─► wait for terminal event (bounded)
//!         ├─ succeeded ─► Ok(AudioResult)
//!         ├─ failed    ─► Err(Task{reason})
//!         └─ timeout   ─► publish TaskTimedOut, Err(Timeout)
//!                         subscription stays; late events are logged
//! ```
//!
//! ## Rules
//! - Task failures are never retried automatically; use [`TtsAdapter::retry_audio`]
//! - `retry_audio` supersedes every earlier registration for the task id
//! - All operations share one push channel; multiplexing goes through the registry

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::core::builder::ClientBuilder;
use crate::core::connection::{ConnectionState, TransportClient};
use crate::core::registry::SubscriptionHandle;
use crate::error::ClientError;
use crate::events::{Event, EventKind, TaskEvent, TaskStatus};
use crate::listeners::Listener;
use crate::transport::{AudioRequest, TaskApi, TaskData};

/// Capacity of the channel a waiting call reads from.
const WAIT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    /// Server task id (empty if a cache hit carried none).
    pub task_id: String,
    /// Location of the generated audio.
    pub audio_url: Option<String>,
    /// True if the server answered from its cache.
    pub cached: bool,
    /// Raw terminal status.
    pub status: String,
    /// Terminal event, when the result came through the push channel.
    pub event: Option<TaskEvent>,
}

impl AudioResult {
    fn from_cached(data: &TaskData) -> Option<Self> {
        let audio_url = data.audio_url.clone()?;
        Some(Self {
            task_id: data.task_id.clone().unwrap_or_default(),
            audio_url: Some(audio_url),
            cached: true,
            status: data.status.clone().unwrap_or_else(|| "cache_hit".to_owned()),
            event: None,
        })
    }
}

/// Facade for generating speech through the task server.
pub struct TtsAdapter {
    client: Arc<TransportClient>,
    api: Arc<dyn TaskApi>,
    task_timeout: Option<Duration>,
}

impl TtsAdapter {
    /// Starts building an adapter for `cfg`.
    pub fn builder(cfg: Config) -> ClientBuilder {
        ClientBuilder::new(cfg)
    }

    /// Assembles an adapter from its parts.
    ///
    /// `task_timeout = None` waits for a terminal event indefinitely.
    pub fn new(
        client: Arc<TransportClient>,
        api: Arc<dyn TaskApi>,
        task_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            api,
            task_timeout,
        }
    }

    /// Generates audio and waits for the task with the configured timeout.
    pub async fn generate_audio(&self, request: &AudioRequest) -> Result<AudioResult, ClientError> {
        self.generate_audio_with_timeout(request, self.task_timeout)
            .await
    }

    /// Generates audio and waits at most `timeout` for the task (`None` = unbounded).
    ///
    /// # Errors
    /// - [`ClientError::InvalidState`] / [`ClientError::Connection`] if connecting fails
    /// - [`ClientError::Rejected`] if the server refuses the request
    /// - [`ClientError::Task`] if the task fails
    /// - [`ClientError::Timeout`] if no terminal event arrives in time
    pub async fn generate_audio_with_timeout(
        &self,
        request: &AudioRequest,
        timeout: Option<Duration>,
    ) -> Result<AudioResult, ClientError> {
        self.ensure_connected().await?;

        let client_id = self.client.client_id();
        let data = self
            .api
            .submit(request, client_id.as_deref())
            .await?
            .into_data("generate audio")?;
        if let Some(done) = AudioResult::from_cached(&data) {
            tracing::debug!(task_id = %done.task_id, "audio served from cache");
            return Ok(done);
        }

        let task_id = data.task_id.ok_or_else(|| ClientError::Decode {
            reason: "generate audio: response without taskId".to_owned(),
        })?;
        self.submitted(&task_id);

        let (handle, rx) = self
            .client
            .registry()
            .subscribe_channel(task_id.as_str(), WAIT_CHANNEL_CAPACITY)
            .await;
        self.await_terminal(task_id, handle, rx, timeout).await
    }

    /// Re-runs `task_id` and waits for it with the configured timeout.
    ///
    /// Every earlier registration for `task_id` is removed first.
    pub async fn retry_audio(
        &self,
        task_id: &str,
        request: &AudioRequest,
    ) -> Result<AudioResult, ClientError> {
        self.retry_audio_with_timeout(task_id, request, self.task_timeout)
            .await
    }

    /// Re-runs `task_id` and waits at most `timeout` for it.
    pub async fn retry_audio_with_timeout(
        &self,
        task_id: &str,
        request: &AudioRequest,
        timeout: Option<Duration>,
    ) -> Result<AudioResult, ClientError> {
        self.ensure_connected().await?;

        let registry = self.client.registry();
        let superseded = registry.unsubscribe_from_task(task_id).await;
        if superseded > 0 {
            tracing::debug!(task_id, superseded, "retry supersedes earlier subscriptions");
        }
        // Registered before the request so no update of the re-run is missed.
        let (handle, rx) = registry
            .subscribe_channel(task_id, WAIT_CHANNEL_CAPACITY)
            .await;

        let client_id = self.client.client_id();
        let data = match self
            .api
            .retry(task_id, request, client_id.as_deref())
            .await
            .and_then(|resp| resp.into_data("retry audio"))
        {
            Ok(data) => data,
            Err(err) => {
                handle.unsubscribe().await;
                return Err(err);
            }
        };
        if let Some(done) = AudioResult::from_cached(&data) {
            handle.unsubscribe().await;
            return Ok(done);
        }

        match data.task_id {
            Some(new_id) if new_id != task_id => {
                handle.unsubscribe().await;
                self.submitted(&new_id);
                let (handle, rx) = registry
                    .subscribe_channel(new_id.as_str(), WAIT_CHANNEL_CAPACITY)
                    .await;
                self.await_terminal(new_id, handle, rx, timeout).await
            }
            _ => {
                self.submitted(task_id);
                self.await_terminal(task_id.to_owned(), handle, rx, timeout)
                    .await
            }
        }
    }

    /// Fetches the current status of a task.
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskData, ClientError> {
        self.api
            .status(task_id)
            .await?
            .into_data("get task status")
    }

    /// Registers `listener` for every event of `task_id`.
    pub async fn subscribe_to_task(
        &self,
        task_id: impl Into<String>,
        listener: Arc<dyn Listener>,
    ) -> SubscriptionHandle {
        self.client
            .registry()
            .subscribe_to_task(task_id, listener)
            .await
    }

    /// Removes every registration for `task_id`.
    pub async fn unsubscribe_from_task(&self, task_id: &str) -> usize {
        self.client.registry().unsubscribe_from_task(task_id).await
    }

    /// Registers `listener` for every task event.
    pub async fn add_global_listener(&self, listener: Arc<dyn Listener>) -> SubscriptionHandle {
        self.client.registry().add_global_listener(listener).await
    }

    /// Connects the push channel (idempotent).
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.client.connect().await
    }

    /// Closes the push channel.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Closes the push channel and drains every listener.
    pub async fn shutdown(&self) {
        self.client.disconnect().await;
        self.client.registry().shutdown().await;
    }

    /// Client id assigned by the server, if connected.
    pub fn client_id(&self) -> Option<String> {
        self.client.client_id()
    }

    /// True while the push channel is open.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Receiver of lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.client.subscribe_events()
    }

    /// Underlying transport client.
    pub fn transport_client(&self) -> &Arc<TransportClient> {
        &self.client
    }

    async fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.client.is_connected() {
            return Ok(());
        }
        match self.client.connect().await {
            Ok(()) => Ok(()),
            Err(err) if !self.client.has_connected() => Err(ClientError::InvalidState {
                reason: format!("client was never connected and auto-connect failed: {err}"),
            }),
            Err(err) => Err(err),
        }
    }

    fn submitted(&self, task_id: &str) {
        tracing::debug!(task_id, "task submitted");
        self.client
            .bus()
            .publish(Event::new(EventKind::TaskSubmitted).with_task(task_id));
    }

    async fn await_terminal(
        &self,
        task_id: String,
        handle: SubscriptionHandle,
        mut rx: mpsc::Receiver<TaskEvent>,
        timeout: Option<Duration>,
    ) -> Result<AudioResult, ClientError> {
        // The task may have finished before the subscription existed.
        match self
            .api
            .status(&task_id)
            .await
            .and_then(|resp| resp.into_data("get task status"))
        {
            Ok(snapshot) => {
                if let Some(ev) = snapshot.to_event(&task_id).filter(TaskEvent::is_terminal) {
                    handle.unsubscribe().await;
                    return finish(task_id, ev);
                }
            }
            Err(err) => {
                tracing::debug!(task_id = %task_id, error = %err, "initial status check failed");
            }
        }

        let wait = async {
            while let Some(ev) = rx.recv().await {
                if ev.is_terminal() {
                    return Some(ev);
                }
                tracing::trace!(task_id = %ev.task_id, status = %ev.raw_status, "task progress");
            }
            None
        };
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| limit),
            None => Ok(wait.await),
        };

        match outcome {
            Ok(Some(ev)) => finish(task_id, ev),
            Ok(None) => Err(ClientError::InvalidState {
                reason: format!("subscription for task {task_id} was removed before it finished"),
            }),
            Err(limit) => {
                tracing::warn!(task_id = %task_id, timeout = ?limit, "stopped waiting for task");
                self.client.bus().publish(
                    Event::new(EventKind::TaskTimedOut)
                        .with_task(task_id.as_str())
                        .with_timeout(limit),
                );
                Err(ClientError::Timeout {
                    task_id,
                    timeout: limit,
                })
            }
        }
    }
}

fn finish(task_id: String, ev: TaskEvent) -> Result<AudioResult, ClientError> {
    match ev.status {
        TaskStatus::Failed => Err(ClientError::Task {
            task_id,
            reason: ev.failure_reason(),
        }),
        _ => Ok(AudioResult {
            task_id,
            audio_url: ev.audio_url().map(str::to_owned),
            cached: ev.raw_status == "cache_hit",
            status: ev.raw_status.clone(),
            event: Some(ev),
        }),
    }
}
