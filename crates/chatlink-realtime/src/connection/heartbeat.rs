//! Keep-alive timer that exists only while the connection is `Ready`.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// A running heartbeat.
///
/// Dropping it cancels every future tick. The epoch it was started under
/// is handed back on each tick so the driver can discard ticks that belong
/// to a session the caller has already torn down.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Interval,
    epoch: u64,
}

impl Heartbeat {
    /// Starts a heartbeat whose first tick is one full `period` from now.
    pub fn start(period: Duration, epoch: u64) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, epoch }
    }

    /// Waits for the next tick. Cancel safe.
    pub async fn tick(&mut self) -> u64 {
        self.interval.tick().await;
        self.epoch
    }

    /// Interval between ticks.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

/// Awaits the next tick of an optional heartbeat; never resolves when `None`.
pub async fn next_tick(heartbeat: &mut Option<Heartbeat>) -> u64 {
    match heartbeat {
        Some(hb) => hb.tick().await,
        None => std::future::pending().await,
    }
}
