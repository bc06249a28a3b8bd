//! Capped exponential reconnect delay.

use std::time::Duration;

use chatlink_core::config::RealtimeConfig;

/// `delay(attempt) = min(base * 2^attempt, max)`, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a calculator with the given base and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Creates a calculator from the realtime configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }

    /// Delay before the retry that follows `attempt` consecutive failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// The first `count` delays, starting at attempt 0.
    pub fn schedule(&self, count: usize) -> Vec<Duration> {
        (0..count)
            .map(|attempt| self.delay(u32::try_from(attempt).unwrap_or(u32::MAX)))
            .collect()
    }
}
