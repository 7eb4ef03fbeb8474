//! # TransportClient: the single reconnecting push channel.
//!
//! Owns the connection state machine and the read loop that feeds the
//! [`TaskRegistry`].
//!
//! ## States
//! ```text
//!                connect()                     handshake ok
//! Disconnected ───────────► Connecting ───────────────────────► Connected
//!      ▲  ▲                     │ attempts exhausted               │ stream ends / read error
//!      │  └─────────────────────┘                                  ▼
//!      │                                                      Reconnecting ──► Connected
//!      │ disconnect() (from any state)                             │ attempts exhausted
//!      └───────────────────────────────────── Failed ◄────────────┘
//! ```
//!
//! ## Connect cycle
//! ```text
//! loop attempt in 1..=max_attempts {
//!   ├─► publish Connecting{attempt}
//!   ├─► transport.open()
//!   │     ├─ Ok  ──► return session
//!   │     └─ Err ──► publish ConnectFailed{attempt, reason}
//!   └─► if another attempt allowed:
//!         ├─► publish ReconnectScheduled{attempt, delay}
//!         └─► sleep(delay) (cancellable)
//! }
//! publish ReconnectExhausted ──► ConnectionError
//! ```
//!
//! ## Rules
//! - `connect()` is idempotent; concurrent callers share one cycle and observe its outcome
//! - The read loop never awaits listener work (registry dispatch is `try_send`)
//! - Subscriptions live in the registry, so they survive reconnects
//! - `disconnect()` cancels any cycle or read loop and is a no-op when disconnected

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::registry::TaskRegistry;
use crate::error::ClientError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::ReconnectPolicy;
use crate::transport::{MessageStream, ServerMessage, Session, Transport};

/// Connection state of a [`TransportClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel and no attempt in progress.
    Disconnected,
    /// An explicit connect cycle is running.
    Connecting,
    /// The channel is open and the read loop is running.
    Connected,
    /// The channel dropped; the read loop is re-establishing it.
    Reconnecting,
    /// Automatic reconnection gave up; `connect()` starts a new cycle.
    Failed,
}

/// Observable connection status.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Client id from the latest handshake.
    pub client_id: Option<String>,
    /// True once any handshake has ever completed.
    pub ever_connected: bool,
    last_error: Option<ClientError>,
}

/// Cancellation and read loop of the current connection.
struct SessionGuard {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

/// Resets a `Connecting` state if a connect cycle is dropped midway.
struct CycleGuard<'a> {
    status: &'a watch::Sender<ConnectionStatus>,
    token: &'a CancellationToken,
    armed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.token.cancel();
        self.status.send_if_modified(|s| {
            if s.state == ConnectionState::Connecting {
                s.state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
    }
}

/// Reconnecting push channel client.
pub struct TransportClient {
    transport: Arc<dyn Transport>,
    registry: Arc<TaskRegistry>,
    bus: Bus,
    policy: ReconnectPolicy,
    status: watch::Sender<ConnectionStatus>,
    session: Mutex<Option<SessionGuard>>,
}

impl TransportClient {
    /// Creates a disconnected client.
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<TaskRegistry>,
        bus: Bus,
        policy: ReconnectPolicy,
    ) -> Arc<Self> {
        let (status, _rx) = watch::channel(ConnectionStatus {
            state: ConnectionState::Disconnected,
            client_id: None,
            ever_connected: false,
            last_error: None,
        });
        Arc::new(Self {
            transport,
            registry,
            bus,
            policy,
            status,
            session: Mutex::new(None),
        })
    }

    /// Connects unless already connected.
    ///
    /// Returns immediately when connected. While another caller's cycle (or the
    /// automatic reconnection) runs, waits for it and returns its outcome.
    ///
    /// # Errors
    /// [`ClientError::Connection`] when every attempt failed;
    /// [`ClientError::InvalidState`] when `disconnect()` interrupted the cycle.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        let mut rx = self.status.subscribe();
        let mut waited = false;
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match snapshot.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    waited = true;
                    rx.changed().await.map_err(|_| ClientError::InvalidState {
                        reason: "connection status channel closed".to_owned(),
                    })?;
                }
                ConnectionState::Disconnected | ConnectionState::Failed => {
                    if waited {
                        if let Some(err) = snapshot.last_error {
                            return Err(err);
                        }
                    }
                    if let Some(token) = self.claim().await {
                        return self.run_cycle(token).await;
                    }
                }
            }
        }
    }

    /// Closes the channel and stops any connect cycle or reconnection.
    ///
    /// No-op when already disconnected.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        if let Some(SessionGuard { token, join }) = slot.take() {
            token.cancel();
            if let Some(join) = join {
                let _ = join.await;
            }
        }

        let changed = self.status.send_if_modified(|s| {
            let was = s.state;
            // Waiters on an interrupted cycle must not start a new one.
            let interrupted = matches!(
                was,
                ConnectionState::Connecting | ConnectionState::Reconnecting
            );
            s.last_error = interrupted.then(|| ClientError::InvalidState {
                reason: "disconnected while connecting".to_owned(),
            });
            s.state = ConnectionState::Disconnected;
            s.client_id = None;
            was != ConnectionState::Disconnected
        });
        drop(slot);

        if changed {
            tracing::info!("push channel disconnected");
            self.bus.publish(Event::new(EventKind::Disconnected));
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// True while the channel is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Client id from the latest handshake (cleared on disconnect).
    pub fn client_id(&self) -> Option<String> {
        self.status.borrow().client_id.clone()
    }

    /// True once any handshake has ever completed.
    pub fn has_connected(&self) -> bool {
        self.status.borrow().ever_connected
    }

    /// Receiver of status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Receiver of lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Registry fed by this client.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Lifecycle bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Moves `Disconnected | Failed` to `Connecting` and arms a fresh cycle token.
    async fn claim(&self) -> Option<CancellationToken> {
        let mut slot = self.session.lock().await;
        let claimed = self.status.send_if_modified(|s| match s.state {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                s.state = ConnectionState::Connecting;
                s.last_error = None;
                true
            }
            _ => false,
        });
        if !claimed {
            return None;
        }
        if let Some(stale) = slot.take() {
            stale.token.cancel();
        }
        let token = CancellationToken::new();
        *slot = Some(SessionGuard {
            token: token.clone(),
            join: None,
        });
        Some(token)
    }

    async fn run_cycle(self: &Arc<Self>, token: CancellationToken) -> Result<(), ClientError> {
        let mut guard = CycleGuard {
            status: &self.status,
            token: &token,
            armed: true,
        };
        let outcome = tokio::select! {
            _ = token.cancelled() => Err(ClientError::InvalidState {
                reason: "disconnected while connecting".to_owned(),
            }),
            outcome = self.establish() => outcome,
        };
        guard.armed = false;
        drop(guard);

        match outcome {
            Ok((session, attempt)) => self.install(session, token, attempt).await,
            Err(err) => {
                if !token.is_cancelled() {
                    let failure = err.clone();
                    self.status.send_modify(|s| {
                        if s.state == ConnectionState::Connecting {
                            s.state = ConnectionState::Disconnected;
                            s.last_error = Some(failure);
                        }
                    });
                }
                Err(err)
            }
        }
    }

    async fn install(
        self: &Arc<Self>,
        session: Session,
        token: CancellationToken,
        attempt: u32,
    ) -> Result<(), ClientError> {
        let mut slot = self.session.lock().await;
        if token.is_cancelled() {
            return Err(ClientError::InvalidState {
                reason: "disconnected while connecting".to_owned(),
            });
        }

        self.mark_connected(session.client_id, attempt);
        let join = tokio::spawn(Arc::clone(self).drive(session.messages, token.clone()));
        *slot = Some(SessionGuard {
            token,
            join: Some(join),
        });
        Ok(())
    }

    /// Runs bounded attempts until one opens a session.
    async fn establish(&self) -> Result<(Session, u32), ClientError> {
        let mut attempt = 0u32;
        let mut last_reason = String::from("reconnect policy allows no attempts");

        while self.policy.allows(attempt + 1) {
            attempt += 1;
            self.bus
                .publish(Event::new(EventKind::Connecting).with_attempt(attempt));

            match self.transport.open().await {
                Ok(session) => return Ok((session, attempt)),
                Err(err) => {
                    last_reason = err.to_string();
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "connection attempt failed"
                    );
                    self.bus.publish(
                        Event::new(EventKind::ConnectFailed)
                            .with_attempt(attempt)
                            .with_reason(last_reason.as_str()),
                    );

                    if self.policy.allows(attempt + 1) {
                        let delay = self.policy.delay_after(attempt);
                        self.bus.publish(
                            Event::new(EventKind::ReconnectScheduled)
                                .with_attempt(attempt)
                                .with_delay(delay)
                                .with_reason(last_reason.as_str()),
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        tracing::error!(attempts = attempt, reason = %last_reason, "connection attempts exhausted");
        self.bus.publish(
            Event::new(EventKind::ReconnectExhausted)
                .with_attempt(attempt)
                .with_reason(last_reason.as_str()),
        );
        Err(ClientError::Connection {
            attempts: attempt,
            reason: last_reason,
        })
    }

    fn mark_connected(&self, client_id: Option<String>, attempt: u32) {
        let id_for_event = client_id.clone();
        self.status.send_modify(|s| {
            s.state = ConnectionState::Connected;
            s.client_id = client_id;
            s.ever_connected = true;
            s.last_error = None;
        });

        tracing::info!(attempt, client_id = ?id_for_event, "push channel connected");
        let mut ev = Event::new(EventKind::Connected).with_attempt(attempt);
        if let Some(id) = id_for_event {
            ev = ev.with_client_id(id);
        }
        self.bus.publish(ev);
    }

    /// Read loop: pumps messages and re-establishes the channel when it drops.
    async fn drive(self: Arc<Self>, mut messages: MessageStream, token: CancellationToken) {
        loop {
            let reason = tokio::select! {
                _ = token.cancelled() => return,
                reason = self.pump(&mut messages) => reason,
            };
            if token.is_cancelled() {
                return;
            }

            tracing::warn!(%reason, "push channel lost");
            self.bus
                .publish(Event::new(EventKind::ConnectionLost).with_reason(reason.as_str()));
            self.status
                .send_modify(|s| s.state = ConnectionState::Reconnecting);

            let outcome = tokio::select! {
                _ = token.cancelled() => return,
                outcome = self.establish() => outcome,
            };
            match outcome {
                Ok((session, attempt)) => {
                    messages = session.messages;
                    self.mark_connected(session.client_id, attempt);
                }
                Err(err) => {
                    tracing::error!(error = %err, "giving up on push channel");
                    self.status.send_modify(|s| {
                        s.state = ConnectionState::Failed;
                        s.client_id = None;
                        s.last_error = Some(err);
                    });
                    return;
                }
            }
        }
    }

    /// Forwards messages until the stream breaks; returns why it stopped.
    async fn pump(&self, messages: &mut MessageStream) -> String {
        while let Some(item) = messages.next().await {
            match item {
                Ok(ServerMessage::TaskUpdate(ev)) => {
                    tracing::trace!(task_id = %ev.task_id, status = %ev.raw_status, "task update");
                    self.registry.dispatch(ev).await;
                }
                Ok(ServerMessage::Connected { client_id }) => {
                    tracing::debug!(%client_id, "server reassigned client id");
                    self.status.send_modify(|s| s.client_id = Some(client_id));
                }
                Ok(ServerMessage::Heartbeat) => tracing::trace!("heartbeat"),
                Ok(ServerMessage::Other { event }) => {
                    tracing::debug!(%event, "ignoring push frame");
                }
                Err(ClientError::Decode { reason }) => {
                    tracing::warn!(%reason, "skipping undecodable frame");
                }
                Err(err) => return err.to_string(),
            }
        }
        "stream ended".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskEvent;
    use crate::listeners::ListenerFn;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Transport that fails `failures` times, then hands out sessions fed by test senders.
    struct Scripted {
        failures: AtomicU32,
        opens: AtomicU32,
        feeds: std::sync::Mutex<VecDeque<mpsc::UnboundedReceiver<ServerMessage>>>,
    }

    impl Scripted {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(failures),
                opens: AtomicU32::new(0),
                feeds: std::sync::Mutex::new(VecDeque::new()),
            })
        }

        fn add_session(&self) -> mpsc::UnboundedSender<ServerMessage> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.feeds.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn open(&self) -> Result<Session, ClientError> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::Http {
                    reason: format!("refused #{n}"),
                });
            }
            let Some(rx) = self.feeds.lock().unwrap().pop_front() else {
                return Err(ClientError::Http {
                    reason: "no session scripted".into(),
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

    fn client(transport: Arc<Scripted>, max_attempts: u32) -> Arc<TransportClient> {
        let bus = Bus::new(128);
        let registry = TaskRegistry::new(bus.clone(), 16, 16, Vec::new());
        TransportClient::new(
            transport,
            registry,
            bus,
            ReconnectPolicy::fixed(Duration::from_secs(3), max_attempts),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures_below_bound() {
        for failures in 0..4u32 {
            let transport = Scripted::new(failures);
            let _feed = transport.add_session();
            let c = client(Arc::clone(&transport), 4);

            c.connect().await.expect("connects");
            assert!(c.is_connected());
            assert_eq!(transport.opens.load(Ordering::SeqCst), failures + 1);
            assert_eq!(c.client_id(), Some(format!("client-{}", failures + 1)));
            c.disconnect().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fails_when_failures_reach_bound() {
        let transport = Scripted::new(3);
        let _feed = transport.add_session();
        let c = client(Arc::clone(&transport), 3);
        let mut events = c.subscribe_events();

        let err = c.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { attempts: 3, .. }));
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(!c.has_connected());

        let mut scheduled = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ReconnectScheduled {
                assert_eq!(ev.delay_ms, Some(3000));
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_never_opens() {
        let transport = Scripted::new(0);
        let c = client(Arc::clone(&transport), 0);
        let err = c.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { attempts: 0, .. }));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent_and_shared() {
        let transport = Scripted::new(1);
        let _feed = transport.add_session();
        let c = client(Arc::clone(&transport), 3);

        let (a, b) = tokio::join!(c.connect(), c.connect());
        a.unwrap();
        b.unwrap();
        c.connect().await.unwrap();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_and_keeps_subscriptions() {
        let transport = Scripted::new(0);
        let first = transport.add_session();
        let second = transport.add_session();
        let c = client(Arc::clone(&transport), 3);

        let (tx, mut rx) = mpsc::unbounded_channel();
        c.registry()
            .subscribe_to_task(
                "t1",
                ListenerFn::arc("probe", move |ev: &TaskEvent| {
                    let _ = tx.send(ev.raw_status.clone());
                }),
            )
            .await;

        c.connect().await.unwrap();
        first
            .send(ServerMessage::TaskUpdate(TaskEvent::new("t1", "queued")))
            .unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("queued"));

        drop(first);
        let mut status = c.watch_status();
        status
            .wait_for(|s| s.state == ConnectionState::Connected && s.client_id.as_deref() == Some("client-2"))
            .await
            .unwrap();

        second
            .send(ServerMessage::TaskUpdate(TaskEvent::new("t1", "succeeded")))
            .unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("succeeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reconnection_fails_then_connect_restarts() {
        let transport = Scripted::new(0);
        let first = transport.add_session();
        let c = client(Arc::clone(&transport), 2);
        c.connect().await.unwrap();

        drop(first);
        let mut status = c.watch_status();
        status
            .wait_for(|s| s.state == ConnectionState::Failed)
            .await
            .unwrap();
        assert!(c.has_connected());

        let _again = transport.add_session();
        c.connect().await.unwrap();
        assert!(c.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_reconnect_is_not_undone_by_waiters() {
        let transport = Scripted::new(0);
        let first = transport.add_session();
        let c = client(Arc::clone(&transport), 3);
        c.connect().await.unwrap();

        // No session queued: the read loop fails once and sleeps before retrying.
        drop(first);
        let mut status = c.watch_status();
        status
            .wait_for(|s| s.state == ConnectionState::Reconnecting)
            .await
            .unwrap();

        let waiter = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.connect().await }
        });
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let _second = transport.add_session();
        c.disconnect().await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }), "{err:?}");
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);

        // An explicit connect afterwards still works.
        c.connect().await.unwrap();
        assert!(c.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_is_idempotent() {
        let transport = Scripted::new(0);
        let _feed = transport.add_session();
        let c = client(transport, 1);
        let mut events = c.subscribe_events();

        c.disconnect().await;
        c.connect().await.unwrap();
        c.disconnect().await;
        c.disconnect().await;
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.client_id(), None);

        let disconnects = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| e.kind == EventKind::Disconnected)
            .count();
        assert_eq!(disconnects, 1);
    }
}
