//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional TOML file, an optional environment overlay, and
//! `CHATLINK__`-prefixed environment variables. Each sub-module represents
//! a logical configuration section.

pub mod logging;
pub mod realtime;
pub mod server;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::realtime::RealtimeConfig;
pub use self::server::ServerConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`CHATLINK__REALTIME__API_PATH`).
pub const ENV_PREFIX: &str = "CHATLINK";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collaboration server and credentials.
    #[serde(default)]
    pub server: ServerConfig,
    /// Real-time client settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config_path` (if it exists), then `config/{env}` (if it
    /// exists), then environment variables prefixed with `CHATLINK__`.
    /// The result is validated before it is returned.
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        tracing::debug!(path = %config_path, env = %env, "Loading configuration");

        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.realtime.validate()?;
        Ok(app)
    }

    /// Returns a copy that is safe to print: the token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.server.token = self.server.masked_token();
        copy
    }
}
