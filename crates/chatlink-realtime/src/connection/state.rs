//! Connection state, credentials, and the diagnostic snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of the single managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and no attempt in flight (a reconnect may be pending).
    #[default]
    Disconnected,
    /// Transport is being opened.
    Connecting,
    /// Transport is open, authentication challenge sent.
    AwaitingAuth,
    /// Authenticated; heartbeat running.
    Ready,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::AwaitingAuth => write!(f, "awaiting_auth"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Server URL and token retained for automatic re-authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Server URL as given by the caller.
    pub server_url: String,
    /// Access token.
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Snapshot of connection info (serializable)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Current state
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful authentication
    pub reconnect_attempts: u32,
    /// Websocket endpoint in use
    pub endpoint: Option<String>,
    /// Local id of the current socket, for log correlation
    pub connection_id: Option<Uuid>,
    /// Server build version from the greeting
    pub server_version: Option<String>,
    /// Connection id assigned by the server in the greeting
    pub server_connection_id: Option<String>,
    /// Highest event sequence number seen from the server
    pub last_server_seq: Option<u64>,
    /// When the current session reached `Ready`
    pub connected_at: Option<DateTime<Utc>>,
    /// Why the last attempt failed; cleared once authenticated
    pub last_error: Option<String>,
}
