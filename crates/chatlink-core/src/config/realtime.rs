//! Real-time event client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Real-time (websocket) client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Path appended to the server URL to reach the websocket endpoint.
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for any reconnect delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// Keep-alive ping interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Inbound frames larger than this are dropped unparsed.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_path: default_api_path(),
            reconnect_base_delay_ms: default_base_delay(),
            reconnect_max_delay_ms: default_max_delay(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl RealtimeConfig {
    /// Base reconnect delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Maximum reconnect delay as a [`Duration`].
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Checks the values that would otherwise make the client spin or stall.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.reconnect_base_delay_ms == 0 {
            return Err(AppError::configuration(
                "realtime.reconnect_base_delay_ms must be greater than zero",
            ));
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(AppError::configuration(format!(
                "realtime.reconnect_max_delay_ms ({}) is below the base delay ({})",
                self.reconnect_max_delay_ms, self.reconnect_base_delay_ms
            )));
        }
        if self.heartbeat_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.heartbeat_interval_seconds must be greater than zero",
            ));
        }
        if !self.api_path.starts_with('/') {
            return Err(AppError::configuration(format!(
                "realtime.api_path must start with '/': {}",
                self.api_path
            )));
        }
        if self.max_frame_bytes == 0 {
            return Err(AppError::configuration(
                "realtime.max_frame_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_api_path() -> String {
    "/api/v4/websocket".to_string()
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
