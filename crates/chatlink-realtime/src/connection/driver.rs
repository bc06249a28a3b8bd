//! Connection driver: the single task that owns the socket, the timers,
//! and the [`ConnectionState`].
//!
//! The public [`ConnectionManager`](super::manager::ConnectionManager)
//! forwards commands here over an unbounded channel. Every state
//! transition happens inside [`Driver::run`], one event at a time.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use chatlink_core::{AppError, AppResult};
use chatlink_core::config::RealtimeConfig;

use crate::dispatch::dispatcher::EventDispatcher;
use crate::message::codec;
use crate::message::types::{AuthReply, ClientAction, DomainEvent, InboundFrame, ServerHello};
use crate::metrics::ClientMetrics;

use super::backoff::Backoff;
use super::heartbeat::{self, Heartbeat};
use super::state::{ConnectionInfo, ConnectionState, Credentials};
use super::transport::{Connector, NORMAL_CLOSURE, SocketCommand, SocketEvent, SocketHandle};

/// Requests from the public handle.
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        credentials: Credentials,
        endpoint: String,
        epoch: u64,
    },
    Disconnect,
    SendTyping {
        channel_id: String,
        parent_id: Option<String>,
    },
}

/// State readable from the public handle without going through the driver.
#[derive(Debug)]
pub(crate) struct Shared {
    pub state: watch::Sender<ConnectionState>,
    pub info: watch::Sender<ConnectionInfo>,
    pub attempts: AtomicU32,
    /// Bumped synchronously by `connect`/`disconnect`/`dispose`. Timers and
    /// socket callbacks started under an older epoch are no-ops.
    pub epoch: AtomicU64,
    pub disposed: AtomicBool,
}

impl Shared {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (info, _) = watch::channel(ConnectionInfo::default());
        Self {
            state,
            info,
            attempts: AtomicU32::new(0),
            epoch: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

type PendingOpen = BoxFuture<'static, AppResult<SocketHandle>>;

async fn open_finished(pending: &mut Option<PendingOpen>) -> AppResult<SocketHandle> {
    match pending {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn socket_event(socket: &mut Option<SocketHandle>) -> Option<SocketEvent> {
    match socket {
        Some(s) => s.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

pub(crate) struct Driver {
    config: RealtimeConfig,
    backoff: Backoff,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<EventDispatcher>,
    metrics: Arc<ClientMetrics>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,

    state: ConnectionState,
    credentials: Option<Credentials>,
    endpoint: Option<String>,
    epoch: u64,
    socket: Option<SocketHandle>,
    pending_open: Option<PendingOpen>,
    reconnect: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Heartbeat>,
    next_seq: u64,
    challenge_seq: Option<u64>,
    conn_id: Option<Uuid>,
}

impl Driver {
    pub fn new(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<EventDispatcher>,
        metrics: Arc<ClientMetrics>,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backoff: Backoff::from_config(&config),
            config,
            connector,
            dispatcher,
            metrics,
            shared,
            commands,
            cancel,
            state: ConnectionState::Disconnected,
            credentials: None,
            endpoint: None,
            epoch: 0,
            socket: None,
            pending_open: None,
            reconnect: None,
            heartbeat: None,
            next_seq: 1,
            challenge_seq: None,
            conn_id: None,
        }
    }

    /// Runs until disposed or until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                result = open_finished(&mut self.pending_open) => {
                    self.pending_open = None;
                    self.on_open(result);
                }

                event = socket_event(&mut self.socket) => self.on_socket_event(event),

                _ = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.on_reconnect_due();
                }

                epoch = heartbeat::next_tick(&mut self.heartbeat) => self.on_heartbeat(epoch),
            }
        }

        self.teardown("client disposed");
        self.credentials = None;
        self.dispatcher.clear();
        debug!("Connection driver stopped");
    }

    fn is_current(&self) -> bool {
        self.shared.epoch.load(Ordering::SeqCst) == self.epoch
            && !self.shared.disposed.load(Ordering::SeqCst)
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        trace!(conn_id = ?self.conn_id, from = %self.state, to = %next, "State transition");
        let was_ready = self.state == ConnectionState::Ready;
        self.state = next;
        self.shared.state.send_replace(next);

        if next != ConnectionState::Ready {
            self.heartbeat = None;
        }
        if was_ready {
            self.dispatcher.publish_status(false);
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                credentials,
                endpoint,
                epoch,
            } => {
                self.teardown("superseded by a new connect");
                info!(endpoint = %endpoint, "Connecting");
                self.credentials = Some(credentials);
                self.endpoint = Some(endpoint.clone());
                self.epoch = epoch;
                self.shared.attempts.store(0, Ordering::SeqCst);
                self.shared.info.send_modify(|i| {
                    *i = ConnectionInfo {
                        endpoint: Some(endpoint),
                        ..ConnectionInfo::default()
                    };
                });
                self.start_attempt();
            }
            Command::Disconnect => {
                if self.state != ConnectionState::Disconnected || self.reconnect.is_some() {
                    info!(conn_id = ?self.conn_id, "Disconnecting");
                }
                self.teardown("client disconnect");
                self.credentials = None;
            }
            Command::SendTyping {
                channel_id,
                parent_id,
            } => {
                // Best effort: only while a socket is open.
                if self.socket.is_some() {
                    self.send(ClientAction::UserTyping {
                        channel_id,
                        parent_id,
                    });
                } else {
                    trace!("Dropping typing indicator; no open socket");
                }
            }
        }
    }

    /// Cancels timers, closes the socket with a normal-closure frame, and
    /// moves to `Disconnected` (firing status `false` if it was `Ready`).
    fn teardown(&mut self, reason: &str) {
        self.reconnect = None;
        self.pending_open = None;
        self.heartbeat = None;
        self.challenge_seq = None;
        if let Some(socket) = self.socket.take() {
            let _ = socket.outbound.send(SocketCommand::Close {
                code: NORMAL_CLOSURE,
                reason: reason.to_string(),
            });
        }
        self.set_state(ConnectionState::Disconnected);
        self.conn_id = None;
    }

    fn start_attempt(&mut self) {
        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        debug_assert!(self.socket.is_none(), "previous socket must be released first");

        self.set_state(ConnectionState::Connecting);
        let connector = self.connector.clone();
        self.pending_open = Some(Box::pin(async move { connector.open(&endpoint).await }));
    }

    fn on_open(&mut self, result: AppResult<SocketHandle>) {
        if !self.is_current() {
            if let Ok(socket) = result {
                let _ = socket.outbound.send(SocketCommand::Close {
                    code: NORMAL_CLOSURE,
                    reason: "stale connection attempt".to_string(),
                });
            }
            return;
        }

        match result {
            Ok(socket) => {
                let conn_id = Uuid::new_v4();
                ClientMetrics::inc(&self.metrics.connections_opened);
                self.conn_id = Some(conn_id);
                self.socket = Some(socket);
                self.next_seq = 1;
                self.shared
                    .info
                    .send_modify(|i| i.connection_id = Some(conn_id));
                self.set_state(ConnectionState::AwaitingAuth);

                let Some(token) = self.credentials.as_ref().map(|c| c.token.clone()) else {
                    return;
                };
                self.challenge_seq = self.send(ClientAction::AuthenticationChallenge { token });
                debug!(conn_id = %conn_id, seq = ?self.challenge_seq, "Socket open, authentication challenge sent");
            }
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                self.shared
                    .info
                    .send_modify(|i| i.last_error = Some(e.to_string()));
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn on_socket_event(&mut self, event: Option<SocketEvent>) {
        match event {
            Some(SocketEvent::Text(raw)) => self.on_frame(&raw),
            Some(SocketEvent::Closed { code, reason }) => {
                self.on_transport_lost(&format!("closed by peer (code {code:?}, reason '{reason}')"));
            }
            Some(SocketEvent::Error(e)) => self.on_transport_lost(&format!("transport error: {e}")),
            None => self.on_transport_lost("socket task ended"),
        }
    }

    fn on_frame(&mut self, raw: &str) {
        ClientMetrics::inc(&self.metrics.frames_received);

        let frame = match codec::decode(raw, self.config.max_frame_bytes) {
            Ok(frame) => frame,
            Err(e) => {
                ClientMetrics::inc(&self.metrics.frames_malformed);
                trace!(conn_id = ?self.conn_id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        match frame {
            InboundFrame::Reply(reply) => self.on_reply(reply),
            InboundFrame::Hello(hello) => self.on_hello(hello),
            InboundFrame::Event(event) => self.on_event(event),
        }
    }

    fn on_reply(&mut self, reply: AuthReply) {
        if self.state != ConnectionState::AwaitingAuth {
            match reply {
                AuthReply::Ok { seq_reply } => trace!(seq_reply = ?seq_reply, "Action acknowledged"),
                AuthReply::Fail { seq_reply, error } => {
                    warn!(seq_reply = ?seq_reply, error = %error, "Server rejected action");
                }
            }
            return;
        }

        let correlated = match reply.seq_reply() {
            None => true,
            Some(seq) => Some(seq) == self.challenge_seq,
        };
        if !correlated {
            debug!(seq_reply = ?reply.seq_reply(), expected = ?self.challenge_seq, "Ignoring uncorrelated reply during handshake");
            return;
        }

        match reply {
            AuthReply::Ok { .. } => self.on_authenticated(),
            AuthReply::Fail { error, .. } => self.on_auth_failed(&error),
        }
    }

    fn on_authenticated(&mut self) {
        self.challenge_seq = None;
        self.shared.attempts.store(0, Ordering::SeqCst);
        self.heartbeat = Some(Heartbeat::start(self.config.heartbeat_interval(), self.epoch));
        self.shared.info.send_modify(|i| {
            i.connected_at = Some(Utc::now());
            i.last_error = None;
        });
        self.set_state(ConnectionState::Ready);

        info!(conn_id = ?self.conn_id, "Authenticated; connection ready");
        self.dispatcher.publish_status(true);
    }

    fn on_auth_failed(&mut self, error: &serde_json::Value) {
        ClientMetrics::inc(&self.metrics.auth_failures);
        let err = AppError::authentication(format!("Server rejected the token: {error}"));
        warn!(
            conn_id = ?self.conn_id,
            error = %err,
            "Authentication rejected; not retrying until connect() is called again"
        );
        self.teardown("authentication failed");
        self.shared
            .info
            .send_modify(|i| i.last_error = Some(err.to_string()));
    }

    fn on_hello(&mut self, hello: ServerHello) {
        info!(
            conn_id = ?self.conn_id,
            server_version = hello.server_version.as_deref().unwrap_or("unknown"),
            "Server greeting received"
        );
        self.shared.info.send_modify(|i| {
            i.server_version = hello.server_version;
            i.server_connection_id = hello.connection_id;
        });
    }

    fn on_event(&mut self, event: DomainEvent) {
        if let Some(seq) = event.seq {
            self.shared.info.send_if_modified(|i| {
                if i.last_server_seq.is_none_or(|last| seq > last) {
                    i.last_server_seq = Some(seq);
                    true
                } else {
                    false
                }
            });
        }

        ClientMetrics::inc(&self.metrics.events_dispatched);
        if !event.kind.is_routed() {
            ClientMetrics::inc(&self.metrics.events_unrouted);
            debug!(event = %event.kind, "Unrouted event forwarded to diagnostic listeners");
        }
        self.dispatcher.publish(&event);
    }

    fn on_transport_lost(&mut self, reason: &str) {
        warn!(conn_id = ?self.conn_id, state = %self.state, reason = %reason, "Connection lost");
        self.socket = None;
        self.challenge_seq = None;
        self.conn_id = None;
        self.set_state(ConnectionState::Disconnected);

        if self.is_current() && self.credentials.is_some() {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let attempt = self.shared.attempts.load(Ordering::SeqCst);
        let delay = self.backoff.delay(attempt);
        self.shared
            .attempts
            .store(attempt.saturating_add(1), Ordering::SeqCst);
        self.reconnect = Some(Box::pin(time::sleep(delay)));
        ClientMetrics::inc(&self.metrics.reconnects_scheduled);

        info!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
    }

    fn on_reconnect_due(&mut self) {
        if !self.is_current() {
            return;
        }
        debug!(attempt = self.shared.attempts.load(Ordering::SeqCst), "Reconnecting");
        self.start_attempt();
    }

    fn on_heartbeat(&mut self, epoch: u64) {
        if epoch != self.epoch || !self.is_current() || self.state != ConnectionState::Ready {
            self.heartbeat = None;
            return;
        }
        if self.send(ClientAction::Ping).is_some() {
            ClientMetrics::inc(&self.metrics.heartbeats_sent);
        }
    }

    /// Encodes and queues an action; returns the `seq` used.
    fn send(&mut self, action: ClientAction) -> Option<u64> {
        let socket = self.socket.as_ref()?;
        let seq = self.next_seq;

        let text = match codec::encode(seq, &action) {
            Ok(text) => text,
            Err(e) => {
                error!(action = action.name(), error = %e, "Failed to encode action");
                return None;
            }
        };

        if socket.outbound.send(SocketCommand::Text(text)).is_err() {
            debug!(action = action.name(), "Socket writer gone; dropping action");
            return None;
        }
        self.next_seq += 1;
        trace!(action = action.name(), seq = seq, "Action sent");
        Some(seq)
    }
}
