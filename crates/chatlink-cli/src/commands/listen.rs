//! Connect to a server and print events as they arrive.

use clap::Args;
use serde_json::json;

use chatlink_core::error::AppError;
use chatlink_realtime::{ConnectionManager, DomainEvent, EventKind};

use super::Cli;
use crate::output;

/// Arguments for the listen command
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Override the server URL from configuration
    #[arg(long)]
    pub server_url: Option<String>,

    /// Override the access token from configuration
    #[arg(long)]
    pub token: Option<String>,

    /// Print one JSON object per line
    #[arg(long)]
    pub json: bool,
}

/// Execute the listen command
pub async fn execute(args: &ListenArgs, cli: &Cli) -> Result<(), AppError> {
    let mut config = cli.load_config()?;

    if let Some(ref url) = args.server_url {
        config.server.url = url.clone();
    }
    if let Some(ref token) = args.token {
        config.server.token = token.clone();
    }
    if config.server.url.is_empty() {
        return Err(AppError::validation(
            "No server URL; pass --server-url or set server.url",
        ));
    }

    let manager = ConnectionManager::with_defaults(config.realtime.clone())?;
    let dispatcher = manager.dispatcher();
    let json = args.json;

    dispatcher.subscribe_status(move |connected| {
        if json {
            output::print_json_line(&json!({ "type": "status", "connected": connected }));
        } else if connected {
            output::print_success("connected");
        } else {
            output::print_warning("disconnected");
        }
    });

    for kind in EventKind::ROUTED {
        dispatcher.subscribe(kind, move |event| print_event(event, json, false));
    }
    dispatcher.subscribe_unrouted(move |event| print_event(event, json, true));

    manager.connect(&config.server.url, &config.server.token)?;
    if !json {
        println!("Listening on {} (Ctrl+C to stop)", config.server.url);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to wait for Ctrl+C");
    }

    let metrics = manager.metrics();
    manager.dispose().await;

    if json {
        output::print_json_line(&json!({ "type": "metrics", "metrics": metrics }));
    } else {
        println!();
        output::print_kv("Events dispatched", &metrics.events_dispatched.to_string());
        output::print_kv("Malformed frames", &metrics.frames_malformed.to_string());
        output::print_kv("Reconnects scheduled", &metrics.reconnects_scheduled.to_string());
    }
    Ok(())
}

fn print_event(event: &DomainEvent, json: bool, unrouted: bool) {
    if json {
        output::print_json_line(&json!({
            "type": if unrouted { "unrouted" } else { "event" },
            "event": event,
        }));
        return;
    }

    let scope = if !event.broadcast.channel_id.is_empty() {
        format!("channel {}", event.broadcast.channel_id)
    } else if !event.broadcast.user_id.is_empty() {
        format!("user {}", event.broadcast.user_id)
    } else if !event.broadcast.team_id.is_empty() {
        format!("team {}", event.broadcast.team_id)
    } else {
        "all".to_string()
    };
    let seq = event.seq.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    let marker = if unrouted { " (unrouted)" } else { "" };

    println!("[{seq}] {}{marker} -> {scope}: {}", event.kind, event.data);
}
