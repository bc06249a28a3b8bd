//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use chatlink_core::error::AppError;

use super::Cli;
use crate::output;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (token masked)
    Show,
    /// Validate configuration file
    Validate,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, cli: &Cli) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = cli.load_config()?;
            output::print_item(&config.redacted(), cli.format);
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!("Configuration '{}' is valid", cli.config));
                output::print_kv("Server", &config.server.url);
                output::print_kv("Token", &config.server.masked_token());
                output::print_kv("Websocket path", &config.realtime.api_path);
                output::print_kv(
                    "Reconnect delay",
                    &format!(
                        "{}..{} ms",
                        config.realtime.reconnect_base_delay_ms,
                        config.realtime.reconnect_max_delay_ms
                    ),
                );
                output::print_kv(
                    "Heartbeat",
                    &format!("{} s", config.realtime.heartbeat_interval_seconds),
                );
                if config.server.url.is_empty() || config.server.token.is_empty() {
                    output::print_warning(
                        "server.url or server.token is empty; `listen` will need --server-url/--token",
                    );
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
