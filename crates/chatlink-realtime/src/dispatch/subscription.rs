//! Subscription identifiers, topics, and the reverse index used to unsubscribe.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::message::types::{DomainEvent, EventKind};

/// Callback invoked with each domain event of a subscribed kind.
pub type EventListener = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Callback invoked with `true` on entering `Ready` and `false` on leaving it.
pub type StatusListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle returned by every subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a listener is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Events with this exact tag.
    Event(EventKind),
    /// Every event whose tag has no dedicated variant.
    Unrouted,
    /// Connection status changes.
    Status,
}

/// A registered callback.
#[derive(Clone)]
pub(crate) enum Listener {
    Event(EventListener),
    Status(StatusListener),
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(_) => f.write_str("Listener::Event"),
            Self::Status(_) => f.write_str("Listener::Status"),
        }
    }
}

/// Tracks subscription-to-topic mappings (reverse index).
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    /// Subscription ID → topic it was registered on.
    id_to_topic: DashMap<SubscriptionId, Topic>,
}

impl SubscriptionTracker {
    /// Creates a new subscription tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription.
    pub fn add(&self, id: SubscriptionId, topic: Topic) {
        self.id_to_topic.insert(id, topic);
    }

    /// Removes a subscription, returning the topic it was on.
    pub fn remove(&self, id: SubscriptionId) -> Option<Topic> {
        self.id_to_topic.remove(&id).map(|(_, topic)| topic)
    }

    /// Returns the number of live subscriptions.
    pub fn count(&self) -> usize {
        self.id_to_topic.len()
    }

    /// Forgets every subscription.
    pub fn clear(&self) {
        self.id_to_topic.clear();
    }
}
