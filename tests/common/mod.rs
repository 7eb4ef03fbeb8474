#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cradle_link::{
    ApiResponse, AudioRequest, ClientError, Config, Event, EventKind, ServerMessage, Session,
    TaskApi, TaskData, TaskEvent, Transport, TtsAdapter,
};
use futures::{StreamExt, stream};
use tokio::sync::{Notify, broadcast, mpsc};

/// Push channel handed to the client by [`MockTransport`].
pub type Feed = mpsc::UnboundedSender<ServerMessage>;

/// Transport that fails a scripted number of times, then opens queued sessions.
#[derive(Default)]
pub struct MockTransport {
    failures: AtomicU32,
    opens: AtomicU32,
    sessions: Mutex<VecDeque<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(times: u32) -> Arc<Self> {
        let t = Self::default();
        t.failures.store(times, Ordering::SeqCst);
        Arc::new(t)
    }

    /// Queues a session; the returned sender feeds it, dropping it ends the stream.
    pub fn add_session(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push_back(rx);
        tx
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<Session, ClientError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(ClientError::Http {
                reason: format!("connection refused (attempt {n})"),
            });
        }
        let Some(rx) = self.sessions.lock().unwrap().pop_front() else {
            return Err(ClientError::Http {
                reason: "server unavailable".into(),
            });
        };
        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|m| (Ok(m), rx))
        })
        .boxed();
        Ok(Session {
            client_id: Some(format!("client-{n}")),
            messages,
        })
    }
}

/// Task API with canned responses.
#[derive(Default)]
pub struct MockApi {
    pub submit_responses: Mutex<VecDeque<Result<ApiResponse, ClientError>>>,
    pub retry_responses: Mutex<VecDeque<Result<ApiResponse, ClientError>>>,
    pub status_response: Mutex<Option<ApiResponse>>,
    /// Signalled by every status call; the waiting subscription exists by then.
    pub status_checked: Notify,
    pub submits: Mutex<Vec<(AudioRequest, Option<String>)>>,
    pub retries: Mutex<Vec<(String, Option<String>)>>,
    pub status_calls: AtomicU32,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(&self, resp: Result<ApiResponse, ClientError>) {
        self.submit_responses.lock().unwrap().push_back(resp);
    }

    pub fn on_retry(&self, resp: Result<ApiResponse, ClientError>) {
        self.retry_responses.lock().unwrap().push_back(resp);
    }

    pub fn submit_count(&self) -> usize {
        self.submits.lock().unwrap().len()
    }

    /// Waits until `n` status checks happened in total.
    pub async fn wait_for_status_checks(&self, n: u32) {
        while self.status_calls.load(Ordering::SeqCst) < n {
            self.status_checked.notified().await;
        }
    }
}

#[async_trait]
impl TaskApi for MockApi {
    async fn submit(
        &self,
        request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        self.submits
            .lock()
            .unwrap()
            .push((request.clone(), client_id.map(str::to_owned)));
        self.submit_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(rejected("no submit response scripted")))
    }

    async fn retry(
        &self,
        task_id: &str,
        _request: &AudioRequest,
        client_id: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        self.retries
            .lock()
            .unwrap()
            .push((task_id.to_owned(), client_id.map(str::to_owned)));
        self.retry_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(rejected("no retry response scripted")))
    }

    async fn status(&self, task_id: &str) -> Result<ApiResponse, ClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let resp = self.status_response.lock().unwrap().clone();
        self.status_checked.notify_one();
        resp.ok_or_else(|| ClientError::Http {
            reason: format!("no status for {task_id}"),
        })
    }
}

pub fn accepted(task_id: &str) -> ApiResponse {
    ApiResponse {
        success: true,
        data: Some(TaskData {
            task_id: Some(task_id.to_owned()),
            status: Some("queued".to_owned()),
            ..TaskData::default()
        }),
        error: None,
    }
}

pub fn cached(task_id: &str, url: &str) -> ApiResponse {
    ApiResponse {
        success: true,
        data: Some(TaskData {
            task_id: Some(task_id.to_owned()),
            audio_url: Some(url.to_owned()),
            cached: true,
            ..TaskData::default()
        }),
        error: None,
    }
}

pub fn rejected(msg: &str) -> ApiResponse {
    ApiResponse {
        success: false,
        data: None,
        error: Some(msg.to_owned()),
    }
}

pub fn update(task_id: &str, status: &str) -> ServerMessage {
    ServerMessage::TaskUpdate(TaskEvent::new(task_id, status))
}

pub fn request() -> AudioRequest {
    AudioRequest::new("voice-1", "hello there", "tester@example.com")
}

pub fn config(max_attempts: u32) -> Config {
    Config {
        reconnect_delay: Duration::from_secs(3),
        max_reconnect_attempts: max_attempts,
        task_timeout: Duration::from_secs(60),
        ..Config::default()
    }
}

pub fn adapter(cfg: Config, transport: &Arc<MockTransport>, api: &Arc<MockApi>) -> Arc<TtsAdapter> {
    let adapter = TtsAdapter::builder(cfg)
        .with_transport(transport.clone())
        .with_api(api.clone())
        .build()
        .expect("adapter builds");
    Arc::new(adapter)
}

/// Skips lifecycle events until one of `kind` arrives.
pub async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        match rx.recv().await {
            Ok(ev) if ev.kind == kind => return ev,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed before {kind:?}"),
        }
    }
}

/// Lifecycle events already published, in order.
pub fn drain_kinds(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    kinds
}
