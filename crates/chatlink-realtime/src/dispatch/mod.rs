//! Typed listener registry for domain events and connection status.

pub mod dispatcher;
pub mod subscription;

pub use dispatcher::EventDispatcher;
pub use subscription::{EventListener, StatusListener, SubscriptionId, Topic};
