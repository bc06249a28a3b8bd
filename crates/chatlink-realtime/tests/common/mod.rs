//! Shared helpers for connection tests: an in-memory connector whose sockets
//! the test drives by hand.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use chatlink_core::config::RealtimeConfig;
use chatlink_core::{AppError, AppResult};
use chatlink_realtime::connection::transport::{
    Connector, SocketCommand, SocketEvent, SocketHandle, SocketPeer,
};
use chatlink_realtime::{ConnectionManager, ConnectionState};

/// Server side of one opened socket.
#[derive(Debug)]
pub struct MockSocket {
    pub url: String,
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
    pub events: mpsc::UnboundedSender<SocketEvent>,
}

impl MockSocket {
    /// Next text frame from the client, parsed as JSON.
    pub async fn next_json(&mut self) -> Value {
        match self.commands.recv().await {
            Some(SocketCommand::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, raw: &str) {
        let _ = self.events.send(SocketEvent::Text(raw.to_string()));
    }

    /// Server-initiated close.
    pub fn close(&self) {
        let _ = self.events.send(SocketEvent::Closed {
            code: Some(1001),
            reason: "going away".to_string(),
        });
    }

    /// Reads the challenge and accepts it.
    pub async fn accept_auth(&mut self) -> Value {
        let challenge = self.next_json().await;
        self.send(serde_json::json!({
            "status": "OK",
            "seq_reply": challenge["seq"],
        }));
        challenge
    }
}

/// Connector handing every opened socket to the test.
#[derive(Debug)]
pub struct MockConnector {
    sockets: mpsc::UnboundedSender<MockSocket>,
    opens: AtomicUsize,
    fail_first: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockSocket>) {
        Self::failing(0)
    }

    /// The first `n` opens fail with a connection error.
    pub fn failing(n: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<MockSocket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            sockets: tx,
            opens: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(n),
            urls: Mutex::new(Vec::new()),
        });
        (connector, rx)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> AppResult<SocketHandle> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::connection(format!("connection refused: {url}")));
        }

        let (handle, SocketPeer { commands, events }) = SocketHandle::pair();
        let _ = self.sockets.send(MockSocket {
            url: url.to_string(),
            commands,
            events,
        });
        Ok(handle)
    }
}

pub fn config() -> RealtimeConfig {
    RealtimeConfig::default()
}

pub async fn wait_for(manager: &ConnectionManager, target: ConnectionState) {
    let mut states = manager.watch_state();
    states.wait_for(|s| *s == target).await.unwrap();
}

/// Connects and completes the handshake on the first socket.
pub async fn ready(
    manager: &ConnectionManager,
    sockets: &mut mpsc::UnboundedReceiver<MockSocket>,
) -> MockSocket {
    manager.connect("https://chat.example.com", "tok").unwrap();
    let mut socket = sockets.recv().await.unwrap();
    socket.accept_auth().await;
    wait_for(manager, ConnectionState::Ready).await;
    socket
}

/// Polls `cond` while letting the driver run.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

/// Records status notifications.
pub fn record_status(manager: &ConnectionManager) -> Arc<Mutex<Vec<bool>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .dispatcher()
        .subscribe_status(move |up| sink.lock().unwrap().push(up));
    seen
}
