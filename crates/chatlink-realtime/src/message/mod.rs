//! Websocket message types, codec, and validation.

pub mod codec;
pub mod types;
pub mod validator;

pub use codec::{CodecError, decode, encode};
pub use types::{AuthReply, Broadcast, ClientAction, DomainEvent, EventKind, InboundFrame, ServerHello};
