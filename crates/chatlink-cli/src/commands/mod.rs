//! CLI command definitions and dispatch.

pub mod backoff;
pub mod config;
pub mod endpoint;
pub mod listen;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use chatlink_core::config::AppConfig;
use chatlink_core::error::AppError;

/// Chatlink: real-time event client for team-chat servers
#[derive(Debug, Parser)]
#[command(name = "chatlink", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay loaded from `config/<ENV>`
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect and print events until Ctrl+C
    Listen(listen::ListenArgs),
    /// Print the websocket endpoint derived from a server URL
    Endpoint(endpoint::EndpointArgs),
    /// Print the reconnect delay schedule
    Backoff(backoff::BackoffArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Listen(args) => listen::execute(args, self).await,
            Commands::Endpoint(args) => endpoint::execute(args, self),
            Commands::Backoff(args) => backoff::execute(args, self),
            Commands::Config(args) => config::execute(args, self),
        }
    }

    /// Load configuration for this invocation
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load(&self.config, &self.env)
    }
}
