//! Connection manager, the public handle to the single managed connection.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatlink_core::config::RealtimeConfig;
use chatlink_core::{AppError, AppResult};

use crate::dispatch::dispatcher::EventDispatcher;
use crate::metrics::{ClientMetrics, MetricsSnapshot};

use super::driver::{Command, Driver, Shared};
use super::endpoint;
use super::state::{ConnectionInfo, ConnectionState, Credentials};
use super::transport::{Connector, WsConnector};

/// Owns one websocket connection and keeps it authenticated.
///
/// Cloning is cheap; every clone drives the same connection. All state
/// transitions happen on a background task, so methods here never block
/// and are safe to call from inside event listeners.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Realtime configuration.
    config: RealtimeConfig,
    /// Listener registry.
    dispatcher: Arc<EventDispatcher>,
    /// Counters.
    metrics: Arc<ClientMetrics>,
    /// State shared with the driver.
    shared: Arc<Shared>,
    /// Command channel into the driver.
    commands: mpsc::UnboundedSender<Command>,
    /// Stops the driver.
    cancel: CancellationToken,
    /// Driver task, taken by `dispose`.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Creates a manager using `connector` to open sockets.
    ///
    /// Must be called inside a tokio runtime; the driver task is spawned
    /// immediately and idles in `Disconnected` until [`connect`](Self::connect).
    pub fn new(config: RealtimeConfig, connector: Arc<dyn Connector>) -> AppResult<Self> {
        config.validate()?;

        let dispatcher = Arc::new(EventDispatcher::new());
        let metrics = Arc::new(ClientMetrics::new());
        let shared = Arc::new(Shared::new());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = Driver::new(
            config.clone(),
            connector,
            dispatcher.clone(),
            metrics.clone(),
            shared.clone(),
            rx,
            cancel.clone(),
        );
        let task = tokio::spawn(driver.run());

        debug!(
            heartbeat_secs = config.heartbeat_interval_seconds,
            base_delay_ms = config.reconnect_base_delay_ms,
            max_delay_ms = config.reconnect_max_delay_ms,
            "Connection manager created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                metrics,
                shared,
                commands: tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Creates a manager backed by a real websocket connector.
    pub fn with_defaults(config: RealtimeConfig) -> AppResult<Self> {
        Self::new(config, Arc::new(WsConnector::new()))
    }

    /// Starts (or restarts) a connection to `server_url`, authenticating
    /// with `token`.
    ///
    /// Any existing socket or pending reconnect is torn down first and the
    /// attempt counter resets. Returns once the attempt has been queued;
    /// watch [`state`](Self::state) or subscribe to status to observe the
    /// outcome.
    pub fn connect(&self, server_url: &str, token: &str) -> AppResult<()> {
        if self.inner.shared.disposed.load(Ordering::SeqCst) {
            return Err(AppError::service_unavailable("Client has been disposed"));
        }
        if token.trim().is_empty() {
            return Err(AppError::validation("Access token must not be empty"));
        }
        let endpoint = endpoint::websocket_url(server_url, &self.inner.config.api_path)?;

        let epoch = self.inner.shared.bump_epoch();
        let command = Command::Connect {
            credentials: Credentials {
                server_url: server_url.to_string(),
                token: token.to_string(),
            },
            endpoint,
            epoch,
        };

        self.inner
            .commands
            .send(command)
            .map_err(|_| AppError::service_unavailable("Connection driver is not running"))
    }

    /// Closes the connection and stops reconnecting.
    ///
    /// Idempotent; a no-op when already disconnected.
    pub fn disconnect(&self) {
        self.inner.shared.bump_epoch();
        if self.inner.commands.send(Command::Disconnect).is_err() {
            debug!("Disconnect ignored; driver already stopped");
        }
    }

    /// Sends a typing indicator for `channel_id`.
    ///
    /// Best effort: dropped silently while no socket is open.
    pub fn send_typing(&self, channel_id: &str, parent_id: Option<&str>) {
        let _ = self.inner.commands.send(Command::SendTyping {
            channel_id: channel_id.to_string(),
            parent_id: parent_id.map(str::to_string),
        });
    }

    /// Stops the connection for good and releases every listener.
    ///
    /// Waits for the driver task to finish. Later calls to
    /// [`connect`](Self::connect) fail.
    pub async fn dispose(&self) {
        if self.inner.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shared.bump_epoch();
        self.inner.cancel.cancel();

        let task = match self.inner.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Connection driver ended abnormally");
            }
        }
        info!("Realtime client disposed");
    }

    /// `true` only while authenticated.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Consecutive failed attempts since the last successful authentication.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.attempts.load(Ordering::SeqCst)
    }

    /// Diagnostic snapshot of the connection.
    pub fn info(&self) -> ConnectionInfo {
        let mut info = self.inner.shared.info.borrow().clone();
        info.state = self.state();
        info.reconnect_attempts = self.reconnect_attempts();
        info
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Listener registry for this connection.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.inner.dispatcher
    }

    /// Realtime configuration in use.
    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatlink_core::error::ErrorKind;

    use crate::connection::transport::SocketHandle;

    #[derive(Debug)]
    struct NeverConnector;

    #[async_trait]
    impl Connector for NeverConnector {
        async fn open(&self, _url: &str) -> AppResult<SocketHandle> {
            std::future::pending().await
        }
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(RealtimeConfig::default(), Arc::new(NeverConnector)).unwrap()
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let m = manager();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.is_connected());
        assert_eq!(m.reconnect_attempts(), 0);
        assert_eq!(m.info(), ConnectionInfo::default());
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_token() {
        let err = manager().connect("https://chat.example.com", "  ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = manager().connect("chat.example.com", "tok").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = RealtimeConfig {
            heartbeat_interval_seconds: 0,
            ..RealtimeConfig::default()
        };
        assert!(ConnectionManager::new(config, Arc::new(NeverConnector)).is_err());
    }

    #[tokio::test]
    async fn test_connect_after_dispose_fails() {
        let m = manager();
        m.dispose().await;
        m.dispose().await;

        let err = m.connect("https://chat.example.com", "tok").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        m.disconnect();
        m.send_typing("c1", None);
    }

    #[tokio::test]
    async fn test_connect_moves_to_connecting() {
        let m = manager();
        let mut states = m.watch_state();
        m.connect("https://chat.example.com/", "tok").unwrap();

        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), ConnectionState::Connecting);
        assert_eq!(
            m.info().endpoint.as_deref(),
            Some("wss://chat.example.com/api/v4/websocket")
        );
    }
}
