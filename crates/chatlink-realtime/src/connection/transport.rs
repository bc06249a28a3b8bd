//! Transport seam between the connection driver and the websocket.
//!
//! The driver only ever sees a [`SocketHandle`]: an outbound command
//! channel and an inbound event channel. [`WsConnector`] backs it with a
//! real `tokio-tungstenite` client and two pump tasks.

use std::fmt;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};

use chatlink_core::error::ErrorKind;
use chatlink_core::{AppError, AppResult};

/// Close code sent on a deliberate disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// What the driver asks the socket to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    /// Send a text frame.
    Text(String),
    /// Send a close frame and stop writing.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// What the socket reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame arrived.
    Text(String),
    /// The peer closed the connection.
    Closed {
        /// Close code, when the peer sent one.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
    /// The transport failed.
    Error(String),
}

/// Driver-side end of an open socket.
#[derive(Debug)]
pub struct SocketHandle {
    /// Outbound commands.
    pub outbound: mpsc::UnboundedSender<SocketCommand>,
    /// Inbound events.
    pub inbound: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Transport-side end of an open socket.
#[derive(Debug)]
pub struct SocketPeer {
    /// Commands from the driver.
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
    /// Events for the driver.
    pub events: mpsc::UnboundedSender<SocketEvent>,
}

impl SocketHandle {
    /// Creates a connected handle/peer pair.
    pub fn pair() -> (SocketHandle, SocketPeer) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            SocketHandle {
                outbound: command_tx,
                inbound: event_rx,
            },
            SocketPeer {
                commands: command_rx,
                events: event_tx,
            },
        )
    }
}

/// Opens sockets for the driver.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug + 'static {
    /// Opens a socket to `url`. Resolves once the transport is open.
    async fn open(&self, url: &str) -> AppResult<SocketHandle>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    _private: (),
}

impl WsConnector {
    /// Creates a connector, installing the process TLS provider if none is set.
    pub fn new() -> Self {
        // Fails only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self { _private: () }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> AppResult<SocketHandle> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Connection,
                format!("Failed to open websocket {url}: {e}"),
                e,
            )
        })?;
        debug!(url = %url, status = %response.status(), "Websocket handshake complete");

        let (mut sink, mut source) = stream.split();
        let (handle, peer) = SocketHandle::pair();
        let SocketPeer {
            mut commands,
            events,
        } = peer;
        let writer_events = events.clone();

        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                match command {
                    SocketCommand::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            let _ = writer_events.send(SocketEvent::Error(e.to_string()));
                            return;
                        }
                    }
                    SocketCommand::Close { code, reason } => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        return;
                    }
                }
            }
            // Handle dropped without an explicit close.
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if events.send(SocketEvent::Text(text.as_str().to_owned())).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                            .unwrap_or((None, String::new()));
                        let _ = events.send(SocketEvent::Closed { code, reason });
                        return;
                    }
                    Ok(other) => trace!(kind = ?other, "Ignoring non-text frame"),
                    Err(e) => {
                        let _ = events.send(SocketEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
            let _ = events.send(SocketEvent::Closed {
                code: None,
                reason: "stream ended".to_string(),
            });
        });

        Ok(handle)
    }
}
