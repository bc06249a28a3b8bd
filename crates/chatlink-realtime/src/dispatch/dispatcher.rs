//! Event dispatcher. Routes domain events and status changes to listeners.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::trace;

use crate::message::types::{DomainEvent, EventKind};

use super::subscription::{Listener, SubscriptionId, SubscriptionTracker, Topic};

/// Registry of listeners keyed by topic.
///
/// Listeners run synchronously, in registration order, on the thread that
/// publishes. A panicking listener is not caught here.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    /// Topic → listeners in registration order.
    topics: DashMap<Topic, Vec<(SubscriptionId, Listener)>>,
    /// Subscription tracker (reverse index).
    subscriptions: SubscriptionTracker,
    /// Next subscription id.
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, topic: Topic, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .entry(topic.clone())
            .or_default()
            .push((id, listener));
        self.subscriptions.add(id, topic);
        id
    }

    /// Registers a listener for events tagged `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.register(Topic::Event(kind), Listener::Event(Arc::new(listener)))
    }

    /// Registers a listener for every event whose tag has no dedicated kind.
    pub fn subscribe_unrouted<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.register(Topic::Unrouted, Listener::Event(Arc::new(listener)))
    }

    /// Registers a connection-status listener.
    pub fn subscribe_status<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.register(Topic::Status, Listener::Status(Arc::new(listener)))
    }

    /// Post created.
    pub fn on_posted<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Posted, listener)
    }

    /// Post edited.
    pub fn on_post_edited<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::PostEdited, listener)
    }

    /// Post deleted.
    pub fn on_post_deleted<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::PostDeleted, listener)
    }

    /// Typing indicator.
    pub fn on_typing<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Typing, listener)
    }

    /// Presence status change.
    pub fn on_status_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::StatusChange, listener)
    }

    /// Reaction added.
    pub fn on_reaction_added<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::ReactionAdded, listener)
    }

    /// Reaction removed.
    pub fn on_reaction_removed<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::ReactionRemoved, listener)
    }

    /// Channel viewed.
    pub fn on_channel_viewed<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::ChannelViewed, listener)
    }

    /// Removes a listener. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some(topic) = self.subscriptions.remove(id) else {
            return false;
        };
        if let Some(mut listeners) = self.topics.get_mut(&topic) {
            listeners.retain(|(sub_id, _)| *sub_id != id);
            if listeners.is_empty() {
                drop(listeners);
                self.topics.remove(&topic);
            }
        }
        true
    }

    // Clone the list out so no map guard is held while listeners run; a
    // listener may subscribe or unsubscribe re-entrantly.
    fn snapshot(&self, topic: &Topic) -> Vec<Listener> {
        self.topics
            .get(topic)
            .map(|entry| entry.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    /// Delivers `event` to every listener of its kind, and to the unrouted
    /// listeners when the kind has no dedicated variant.
    ///
    /// Returns the number of listeners invoked.
    pub fn publish(&self, event: &DomainEvent) -> usize {
        let mut listeners = self.snapshot(&Topic::Event(event.kind.clone()));
        if !event.kind.is_routed() {
            listeners.extend(self.snapshot(&Topic::Unrouted));
        }

        trace!(event = %event.kind, listeners = listeners.len(), "Publishing event");

        for listener in &listeners {
            if let Listener::Event(f) = listener {
                f(event);
            }
        }
        listeners.len()
    }

    /// Delivers a connection-status change.
    pub fn publish_status(&self, connected: bool) -> usize {
        let listeners = self.snapshot(&Topic::Status);
        for listener in &listeners {
            if let Listener::Status(f) = listener {
                f(connected);
            }
        }
        listeners.len()
    }

    /// Number of listeners on a topic.
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map(|l| l.len()).unwrap_or(0)
    }

    /// Total number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.count()
    }

    /// Drops every listener.
    pub fn clear(&self) {
        self.topics.clear();
        self.subscriptions.clear();
    }
}
