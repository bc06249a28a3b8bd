//! Websocket connection management: lifecycle, backoff, heartbeat, transport.

pub mod backoff;
pub(crate) mod driver;
pub mod endpoint;
pub mod heartbeat;
pub mod manager;
pub mod state;
pub mod transport;

pub use manager::ConnectionManager;
pub use state::{ConnectionInfo, ConnectionState};
