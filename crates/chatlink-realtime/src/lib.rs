//! # chatlink-realtime
//!
//! Persistent real-time event client for a team-chat collaboration server.
//! Provides:
//!
//! - A single owned websocket connection driven by an explicit state machine
//!   (`Disconnected → Connecting → AwaitingAuth → Ready`)
//! - Token authentication handshake with correlated replies
//! - Keep-alive heartbeat that only runs while authenticated
//! - Capped exponential reconnect backoff with attempt tracking
//! - A protocol codec that classifies frames and never fails the connection
//! - Typed, order-preserving event dispatch to in-process listeners

pub mod connection;
pub mod dispatch;
pub mod message;
pub mod metrics;

pub use connection::backoff::Backoff;
pub use connection::manager::ConnectionManager;
pub use connection::state::{ConnectionInfo, ConnectionState};
pub use connection::transport::{Connector, WsConnector};
pub use dispatch::dispatcher::EventDispatcher;
pub use message::types::{Broadcast, DomainEvent, EventKind};
pub use metrics::MetricsSnapshot;
