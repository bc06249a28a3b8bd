//! End-to-end connection lifecycle tests against an in-memory socket.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use chatlink_core::config::RealtimeConfig;
use chatlink_core::error::ErrorKind;
use chatlink_realtime::connection::transport::{SocketCommand, SocketEvent};
use chatlink_realtime::{ConnectionManager, ConnectionState};

use common::{MockConnector, config, eventually, ready, record_status, wait_for};

fn expect_close(command: Option<SocketCommand>) {
    match command {
        Some(SocketCommand::Close { code, .. }) => assert_eq!(code, 1000),
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_handshake_then_events_flow() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);
    let posted = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = posted.clone();
    manager
        .dispatcher()
        .on_posted(move |e| sink.lock().unwrap().push(e.data.clone()));

    manager.connect("https://chat.example.com/", "tok").unwrap();
    let mut socket = sockets.recv().await.unwrap();
    assert_eq!(socket.url, "wss://chat.example.com/api/v4/websocket");

    let challenge = socket.next_json().await;
    assert_eq!(
        challenge,
        json!({"action": "authentication_challenge", "seq": 1, "data": {"token": "tok"}})
    );
    assert_eq!(manager.state(), ConnectionState::AwaitingAuth);
    assert!(!manager.is_connected());

    socket.send(json!({
        "event": "hello",
        "data": {"server_version": "9.11.0", "connection_id": "srv-1"},
        "broadcast": {},
        "seq": 0
    }));
    socket.send(json!({"status": "OK", "seq_reply": 1}));
    wait_for(&manager, ConnectionState::Ready).await;
    assert!(manager.is_connected());
    assert_eq!(*status.lock().unwrap(), vec![true]);

    socket.send(json!({
        "event": "posted",
        "data": {"post": "{\"id\":\"p1\"}"},
        "broadcast": {"channel_id": "c1"},
        "seq": 1
    }));
    eventually(|| posted.lock().unwrap().len() == 1).await;
    assert_eq!(posted.lock().unwrap()[0]["post"], "{\"id\":\"p1\"}");

    let info = manager.info();
    assert_eq!(info.state, ConnectionState::Ready);
    assert_eq!(info.server_version.as_deref(), Some("9.11.0"));
    assert_eq!(info.server_connection_id.as_deref(), Some("srv-1"));
    assert_eq!(info.last_server_seq, Some(1));
    assert!(info.connection_id.is_some());
    assert!(info.connected_at.is_some());

    let metrics = manager.metrics();
    assert_eq!(metrics.connections_opened, 1);
    assert_eq!(metrics.frames_received, 3);
    assert_eq!(metrics.events_dispatched, 1);
    assert_eq!(metrics.frames_malformed, 0);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_uncorrelated_reply_does_not_authenticate() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();

    manager.connect("https://chat.example.com", "tok").unwrap();
    let mut socket = sockets.recv().await.unwrap();
    socket.next_json().await;

    socket.send(json!({"status": "OK", "seq_reply": 99}));
    eventually(|| manager.metrics().frames_received == 1).await;
    assert_eq!(manager.state(), ConnectionState::AwaitingAuth);

    socket.send(json!({"status": "OK", "seq_reply": 1}));
    wait_for(&manager, ConnectionState::Ready).await;

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_server_close_schedules_reconnect() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);
    let socket = ready(&manager, &mut sockets).await;

    let start = Instant::now();
    socket.close();
    wait_for(&manager, ConnectionState::Disconnected).await;
    assert_eq!(*status.lock().unwrap(), vec![true, false]);
    assert_eq!(manager.reconnect_attempts(), 1);

    let mut second = sockets.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
    assert_eq!(connector.opens(), 2);

    // Outgoing seq restarts with every socket.
    let challenge = second.accept_auth().await;
    assert_eq!(challenge["seq"], 1);
    wait_for(&manager, ConnectionState::Ready).await;
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(*status.lock().unwrap(), vec![true, false, true]);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_before_auth_reconnects_without_status() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();
    let status = record_status(&manager);

    manager.connect("https://chat.example.com", "tok").unwrap();
    let mut socket = sockets.recv().await.unwrap();
    socket.next_json().await;

    socket
        .events
        .send(SocketEvent::Error("connection reset".into()))
        .unwrap();
    wait_for(&manager, ConnectionState::Disconnected).await;
    assert_eq!(manager.reconnect_attempts(), 1);
    assert!(status.lock().unwrap().is_empty());

    let _second = sockets.recv().await.unwrap();
    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_then_resets_on_auth() {
    let (connector, mut sockets) = MockConnector::failing(3);
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();

    let start = Instant::now();
    manager.connect("https://chat.example.com", "tok").unwrap();

    // Fails at 0s, 1s, 3s; succeeds at 7s.
    let mut socket = sockets.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(7000));
    assert_eq!(connector.opens(), 4);
    assert_eq!(manager.reconnect_attempts(), 3);
    assert_eq!(manager.metrics().reconnects_scheduled, 3);
    let last_error = manager.info().last_error.unwrap();
    assert!(last_error.starts_with("CONNECTION"), "{last_error}");

    socket.accept_auth().await;
    wait_for(&manager, ConnectionState::Ready).await;
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(manager.info().last_error, None);

    // The next drop starts over from the base delay.
    let start = Instant::now();
    socket.close();
    wait_for(&manager, ConnectionState::Disconnected).await;
    assert_eq!(manager.reconnect_attempts(), 1);

    let _next = sockets.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
    assert_eq!(connector.opens(), 5);
    assert_eq!(manager.metrics().reconnects_scheduled, 4);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_does_not_retry() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);

    manager.connect("https://chat.example.com", "bad-token").unwrap();
    let mut socket = sockets.recv().await.unwrap();
    socket.next_json().await;
    socket.send(json!({
        "status": "FAIL",
        "seq_reply": 1,
        "error": {"id": "api.web_socket_router.not_authenticated.app_error"}
    }));

    expect_close(socket.commands.recv().await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.opens(), 1);
    assert!(sockets.try_recv().is_err());
    assert!(status.lock().unwrap().is_empty());
    assert_eq!(manager.metrics().auth_failures, 1);
    assert_eq!(manager.reconnect_attempts(), 0);
    let last_error = manager.info().last_error.unwrap();
    assert!(last_error.starts_with("AUTHENTICATION"), "{last_error}");
    assert!(last_error.contains("not_authenticated"), "{last_error}");

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_terminal() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);
    let mut socket = ready(&manager, &mut sockets).await;

    manager.disconnect();
    expect_close(socket.commands.recv().await);
    // The handle is gone, so no heartbeat can follow.
    assert_eq!(socket.commands.recv().await, None);

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(*status.lock().unwrap(), vec![true, false]);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.opens(), 1);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let (connector, mut sockets) = MockConnector::failing(1);
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();

    manager.connect("https://chat.example.com", "tok").unwrap();
    eventually(|| manager.reconnect_attempts() == 1).await;
    manager.disconnect();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.opens(), 1);
    assert!(sockets.try_recv().is_err());

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_only_while_ready() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();
    let mut socket = ready(&manager, &mut sockets).await;

    let start = Instant::now();
    assert_eq!(socket.next_json().await, json!({"action": "ping", "seq": 2}));
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(socket.next_json().await, json!({"action": "ping", "seq": 3}));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!(manager.metrics().heartbeats_sent, 2);

    socket.close();
    assert_eq!(socket.commands.recv().await, None);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_dropped() {
    let config = RealtimeConfig {
        max_frame_bytes: 256,
        ..RealtimeConfig::default()
    };
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config, connector).unwrap();
    let posted = Arc::new(Mutex::new(0usize));
    let sink = posted.clone();
    manager
        .dispatcher()
        .on_posted(move |_| *sink.lock().unwrap() += 1);
    let socket = ready(&manager, &mut sockets).await;

    socket.send_raw("not json");
    socket.send_raw("");
    socket.send_raw("[1, 2, 3]");
    socket.send(json!({"foo": 1}));
    socket.send(json!({"status": "MAYBE", "seq_reply": 1}));
    socket.send_raw(&format!(r#"{{"event":"posted","data":"{}"}}"#, "x".repeat(300)));
    socket.send(json!({"event": "posted", "data": {}, "broadcast": {}, "seq": 5}));

    eventually(|| *posted.lock().unwrap() == 1).await;
    assert_eq!(manager.state(), ConnectionState::Ready);
    assert_eq!(manager.metrics().frames_malformed, 6);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_events_delivered_in_arrival_order() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    manager
        .dispatcher()
        .on_posted(move |e| sink.lock().unwrap().push(e.seq));
    let sink = seen.clone();
    manager
        .dispatcher()
        .on_typing(move |e| sink.lock().unwrap().push(e.seq));

    let socket = ready(&manager, &mut sockets).await;
    socket.send(json!({"event": "posted", "data": {}, "seq": 1}));
    socket.send(json!({"event": "typing", "data": {"user_id": "u1"}, "seq": 2}));
    socket.send(json!({"event": "posted", "data": {}, "seq": 3}));

    eventually(|| seen.lock().unwrap().len() == 3).await;
    assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(manager.info().last_server_seq, Some(3));

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_unrouted_events_reach_diagnostic_listeners() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();
    let tags = Arc::new(Mutex::new(Vec::new()));
    let sink = tags.clone();
    manager
        .dispatcher()
        .subscribe_unrouted(move |e| sink.lock().unwrap().push(e.kind.to_string()));

    let socket = ready(&manager, &mut sockets).await;
    socket.send(json!({"event": "emoji_added", "data": {"emoji": "{}"}, "seq": 1}));
    socket.send(json!({"event": "posted", "data": {}, "seq": 2}));

    eventually(|| manager.metrics().events_dispatched == 2).await;
    assert_eq!(*tags.lock().unwrap(), vec!["emoji_added".to_string()]);
    assert_eq!(manager.metrics().events_unrouted, 1);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_listener_may_disconnect() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let handle = manager.clone();
    manager.dispatcher().on_posted(move |_| handle.disconnect());

    let mut socket = ready(&manager, &mut sockets).await;
    socket.send(json!({"event": "posted", "data": {}, "seq": 1}));

    expect_close(socket.commands.recv().await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.opens(), 1);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connected_replaces_session() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);
    let mut first = ready(&manager, &mut sockets).await;

    manager.connect("https://other.example.com", "tok2").unwrap();
    expect_close(first.commands.recv().await);

    let mut second = sockets.recv().await.unwrap();
    assert_eq!(second.url, "wss://other.example.com/api/v4/websocket");
    let challenge = second.accept_auth().await;
    assert_eq!(challenge["data"]["token"], "tok2");
    assert_eq!(challenge["seq"], 1);

    wait_for(&manager, ConnectionState::Ready).await;
    assert_eq!(*status.lock().unwrap(), vec![true, false, true]);
    assert_eq!(connector.opens(), 2);

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_send_typing() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector).unwrap();

    // No socket yet: dropped.
    manager.send_typing("c1", None);

    let mut socket = ready(&manager, &mut sockets).await;
    manager.send_typing("c1", None);
    assert_eq!(
        socket.next_json().await,
        json!({"action": "user_typing", "seq": 2, "data": {"channel_id": "c1", "parent_id": ""}})
    );

    manager.send_typing("c1", Some("root-post"));
    assert_eq!(
        socket.next_json().await,
        json!({"action": "user_typing", "seq": 3, "data": {"channel_id": "c1", "parent_id": "root-post"}})
    );

    manager.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_closes_and_releases_listeners() {
    let (connector, mut sockets) = MockConnector::new();
    let manager = ConnectionManager::new(config(), connector.clone()).unwrap();
    let status = record_status(&manager);
    manager.dispatcher().on_posted(|_| {});
    let mut socket = ready(&manager, &mut sockets).await;

    manager.dispose().await;
    expect_close(socket.commands.recv().await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(*status.lock().unwrap(), vec![true, false]);
    assert_eq!(manager.dispatcher().subscription_count(), 0);

    let err = manager
        .connect("https://chat.example.com", "tok")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.opens(), 1);
}
