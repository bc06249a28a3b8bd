//! Client-side diagnostic counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the connection driver.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Sockets successfully opened
    pub connections_opened: AtomicU64,
    /// Text frames received
    pub frames_received: AtomicU64,
    /// Frames dropped by the codec
    pub frames_malformed: AtomicU64,
    /// Domain events handed to the dispatcher
    pub events_dispatched: AtomicU64,
    /// Domain events with an unrecognised tag
    pub events_unrouted: AtomicU64,
    /// Pings sent
    pub heartbeats_sent: AtomicU64,
    /// Reconnect timers armed
    pub reconnects_scheduled: AtomicU64,
    /// Authentication challenges rejected by the server
    pub auth_failures: AtomicU64,
}

impl ClientMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_unrouted: self.events_unrouted.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Sockets successfully opened
    pub connections_opened: u64,
    /// Text frames received
    pub frames_received: u64,
    /// Frames dropped by the codec
    pub frames_malformed: u64,
    /// Domain events handed to the dispatcher
    pub events_dispatched: u64,
    /// Domain events with an unrecognised tag
    pub events_unrouted: u64,
    /// Pings sent
    pub heartbeats_sent: u64,
    /// Reconnect timers armed
    pub reconnects_scheduled: u64,
    /// Authentication challenges rejected by the server
    pub auth_failures: u64,
}
