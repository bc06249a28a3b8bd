//! Websocket endpoint derivation.

use clap::Args;
use serde::Serialize;

use chatlink_core::error::AppError;
use chatlink_realtime::connection::endpoint;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for the endpoint command
#[derive(Debug, Args)]
pub struct EndpointArgs {
    /// Server base URL, e.g. https://chat.example.com
    pub server_url: String,
}

#[derive(Debug, Serialize)]
struct EndpointOutput {
    server_url: String,
    websocket_url: String,
}

/// Execute the endpoint command
pub fn execute(args: &EndpointArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let websocket_url = endpoint::websocket_url(&args.server_url, &config.realtime.api_path)?;

    match cli.format {
        OutputFormat::Text => println!("{}", websocket_url),
        OutputFormat::Json => output::print_item(
            &EndpointOutput {
                server_url: args.server_url.clone(),
                websocket_url,
            },
            cli.format,
        ),
    }
    Ok(())
}
