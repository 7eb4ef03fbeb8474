mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use cradle_link::{
    ApiResponse, ClientError, ConnectionState, EventKind, Listener, ListenerFn, ServerMessage,
    TaskData, TaskEvent,
};
use tokio::sync::mpsc;

fn recorder(name: &'static str) -> (Arc<dyn Listener>, mpsc::UnboundedReceiver<TaskEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: Arc<dyn Listener> = ListenerFn::arc(name, move |ev: &TaskEvent| {
        let _ = tx.send(ev.clone());
    });
    (listener, rx)
}

fn succeeded(task_id: &str, url: &str) -> ServerMessage {
    ServerMessage::TaskUpdate(TaskEvent::new(task_id, "succeeded").with_output(url))
}

#[tokio::test]
async fn generate_audio_resolves_on_success_and_stops_task_delivery() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(accepted("t1")));
    let adapter = adapter(config(3), &transport, &api);

    let (probe, mut probe_rx) = recorder("probe");
    let (global, mut global_rx) = recorder("global");
    adapter.add_global_listener(global).await;
    adapter.subscribe_to_task("t1", probe).await;

    let call = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.generate_audio(&request()).await }
    });
    api.wait_for_status_checks(1).await;

    feed.send(update("t1", "queued")).unwrap();
    feed.send(update("t1", "running")).unwrap();
    feed.send(succeeded("t1", "https://cdn.example.com/t1.mp3")).unwrap();

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.task_id, "t1");
    assert_eq!(result.audio_url.as_deref(), Some("https://cdn.example.com/t1.mp3"));
    assert_eq!(result.status, "succeeded");
    assert!(!result.cached);

    let submits = api.submits.lock().unwrap().clone();
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].1.as_deref(), Some("client-1"));

    for expected in ["queued", "running", "succeeded"] {
        assert_eq!(probe_rx.recv().await.unwrap().raw_status, expected);
    }

    // A stray update after the terminal one reaches globals only.
    feed.send(update("t1", "running")).unwrap();
    feed.send(update("marker", "queued")).unwrap();
    loop {
        let ev = global_rx.recv().await.unwrap();
        if ev.task_id == "marker" {
            break;
        }
    }
    assert!(probe_rx.try_recv().is_err());
    assert_eq!(
        adapter.transport_client().registry().task_listener_count("t1").await,
        0
    );
}

#[tokio::test]
async fn failed_task_surfaces_server_reason() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(accepted("t1")));
    let adapter = adapter(config(3), &transport, &api);

    let call = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.generate_audio(&request()).await }
    });
    api.wait_for_status_checks(1).await;

    feed.send(update("t1", "running")).unwrap();
    feed.send(ServerMessage::TaskUpdate(
        TaskEvent::new("t1", "failed").with_error("voice model crashed"),
    ))
    .unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        ClientError::Task {
            task_id: "t1".into(),
            reason: "voice model crashed".into(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_the_subscription_and_reports_late_events() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(accepted("t1")));
    let adapter = adapter(config(3), &transport, &api);
    let mut events = adapter.subscribe_events();

    let err = adapter
        .generate_audio_with_timeout(&request(), Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Timeout {
            task_id: "t1".into(),
            timeout: Duration::from_secs(5),
        }
    );
    let timed_out = next_of(&mut events, EventKind::TaskTimedOut).await;
    assert_eq!(timed_out.task.as_deref(), Some("t1"));
    assert_eq!(timed_out.timeout_ms, Some(5_000));

    let registry = adapter.transport_client().registry().clone();
    assert_eq!(registry.task_listener_count("t1").await, 1);

    feed.send(succeeded("t1", "https://cdn.example.com/late.mp3"))
        .unwrap();
    let late = next_of(&mut events, EventKind::LateTaskEvent).await;
    assert_eq!(late.task.as_deref(), Some("t1"));
    assert_eq!(late.reason.as_deref(), Some("succeeded"));
    assert_eq!(registry.task_listener_count("t1").await, 0);
}

#[tokio::test]
async fn terminal_status_snapshot_resolves_without_push_updates() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(accepted("t1")));
    *api.status_response.lock().unwrap() = Some(ApiResponse {
        success: true,
        data: Some(TaskData {
            task_id: Some("t1".into()),
            status: Some("completed".into()),
            audio_url: Some("https://cdn.example.com/fast.mp3".into()),
            ..TaskData::default()
        }),
        error: None,
    });
    let adapter = adapter(config(3), &transport, &api);

    let result = adapter.generate_audio(&request()).await.unwrap();
    assert_eq!(result.status, "completed");
    assert_eq!(result.audio_url.as_deref(), Some("https://cdn.example.com/fast.mp3"));
    assert!(
        adapter
            .transport_client()
            .registry()
            .subscribed_tasks()
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn cached_response_resolves_immediately() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(cached("t9", "https://cdn.example.com/cached.mp3")));
    let adapter = adapter(config(3), &transport, &api);

    let result = adapter.generate_audio(&request()).await.unwrap();
    assert!(result.cached);
    assert_eq!(result.task_id, "t9");
    assert_eq!(result.audio_url.as_deref(), Some("https://cdn.example.com/cached.mp3"));
    assert!(result.event.is_none());
    assert_eq!(api.status_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(
        adapter
            .transport_client()
            .registry()
            .subscribed_tasks()
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn rejected_request_is_not_awaited() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(rejected("quota exceeded")));
    let adapter = adapter(config(3), &transport, &api);

    let err = adapter.generate_audio(&request()).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Rejected {
            reason: "quota exceeded".into(),
        }
    );
    assert!(
        adapter
            .transport_client()
            .registry()
            .subscribed_tasks()
            .await
            .is_empty()
    );
}

#[tokio::test(start_paused = true)]
async fn never_connected_client_fails_with_invalid_state() {
    let transport = MockTransport::failing(10);
    let api = MockApi::new();
    let adapter = adapter(config(2), &transport, &api);

    let err = adapter.generate_audio(&request()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState { .. }), "{err:?}");
    assert_eq!(transport.opens(), 2);
    assert_eq!(api.submit_count(), 0);
    assert_eq!(adapter.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn zero_attempts_never_touches_the_transport() {
    let transport = MockTransport::new();
    let api = MockApi::new();
    let adapter = adapter(config(0), &transport, &api);

    let err = adapter.generate_audio(&request()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState { .. }), "{err:?}");
    assert_eq!(transport.opens(), 0);
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnect_after_a_session_reports_connection_error() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    let adapter = adapter(config(2), &transport, &api);

    adapter.connect().await.unwrap();
    let mut status = adapter.transport_client().watch_status();
    drop(feed);
    status
        .wait_for(|s| s.state == ConnectionState::Failed)
        .await
        .unwrap();

    let err = adapter.generate_audio(&request()).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Connection { attempts: 2, .. }),
        "{err:?}"
    );
    assert_eq!(transport.opens(), 5);
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test]
async fn retry_supersedes_earlier_registrations() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_retry(Ok(accepted("t1")));
    let adapter = adapter(config(3), &transport, &api);

    let (probe, mut probe_rx) = recorder("probe");
    adapter.subscribe_to_task("t1", probe).await;

    let call = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.retry_audio("t1", &request()).await }
    });
    api.wait_for_status_checks(1).await;

    let registry = adapter.transport_client().registry().clone();
    assert_eq!(registry.task_listener_count("t1").await, 1);

    feed.send(succeeded("t1", "https://cdn.example.com/retry.mp3"))
        .unwrap();
    let result = call.await.unwrap().unwrap();
    assert_eq!(result.audio_url.as_deref(), Some("https://cdn.example.com/retry.mp3"));
    assert!(probe_rx.try_recv().is_err());

    let retries = api.retries.lock().unwrap().clone();
    assert_eq!(retries, vec![("t1".to_owned(), Some("client-1".to_owned()))]);
}

#[tokio::test]
async fn retry_follows_a_reissued_task_id() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_retry(Ok(accepted("t2")));
    let adapter = adapter(config(3), &transport, &api);

    let call = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.retry_audio("t1", &request()).await }
    });
    api.wait_for_status_checks(1).await;

    let registry = adapter.transport_client().registry().clone();
    assert_eq!(registry.subscribed_tasks().await, vec!["t2".to_owned()]);

    feed.send(succeeded("t2", "https://cdn.example.com/t2.mp3"))
        .unwrap();
    let result = call.await.unwrap().unwrap();
    assert_eq!(result.task_id, "t2");
}

#[tokio::test]
async fn rejected_retry_leaves_no_registration() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let api = MockApi::new();
    api.on_retry(Ok(rejected("task not found")));
    let adapter = adapter(config(3), &transport, &api);

    let err = adapter.retry_audio("t1", &request()).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { .. }), "{err:?}");
    assert!(
        adapter
            .transport_client()
            .registry()
            .subscribed_tasks()
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn concurrent_calls_share_one_connection() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let api = MockApi::new();
    api.on_submit(Ok(accepted("t1")));
    api.on_submit(Ok(accepted("t2")));
    let adapter = adapter(config(3), &transport, &api);

    let calls: Vec<_> = (0..2)
        .map(|_| {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.generate_audio(&request()).await })
        })
        .collect();
    api.wait_for_status_checks(2).await;

    feed.send(succeeded("t2", "https://cdn.example.com/t2.mp3"))
        .unwrap();
    feed.send(succeeded("t1", "https://cdn.example.com/t1.mp3"))
        .unwrap();

    let mut ids = Vec::new();
    for call in calls {
        ids.push(call.await.unwrap().unwrap().task_id);
    }
    ids.sort();
    assert_eq!(ids, vec!["t1", "t2"]);
    assert_eq!(transport.opens(), 1);
}
