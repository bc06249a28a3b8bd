//! Chatlink listener. Keeps one authenticated real-time connection open
//! and logs every event it receives.

use chatlink_core::config::AppConfig;
use chatlink_core::error::AppError;
use chatlink_realtime::ConnectionManager;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Listener error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("CHATLINK_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    let env = std::env::var("CHATLINK_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting chatlink listener v{}", env!("CARGO_PKG_VERSION"));

    if config.server.url.is_empty() || config.server.token.is_empty() {
        return Err(AppError::configuration(
            "server.url and server.token must be set (CHATLINK__SERVER__URL, CHATLINK__SERVER__TOKEN)",
        ));
    }

    let manager = ConnectionManager::with_defaults(config.realtime.clone())?;
    let dispatcher = manager.dispatcher();

    dispatcher.subscribe_status(|connected| {
        if connected {
            tracing::info!("Connected");
        } else {
            tracing::warn!("Connection lost");
        }
    });
    dispatcher.on_posted(|e| {
        tracing::info!(channel_id = %e.broadcast.channel_id, seq = ?e.seq, "New post");
    });
    dispatcher.on_post_edited(|e| {
        tracing::info!(channel_id = %e.broadcast.channel_id, "Post edited");
    });
    dispatcher.on_post_deleted(|e| {
        tracing::info!(channel_id = %e.broadcast.channel_id, "Post deleted");
    });
    dispatcher.on_typing(|e| {
        tracing::debug!(channel_id = %e.broadcast.channel_id, data = %e.data, "Typing");
    });
    dispatcher.on_status_change(|e| {
        tracing::debug!(data = %e.data, "Status change");
    });
    dispatcher.on_reaction_added(|e| {
        tracing::debug!(channel_id = %e.broadcast.channel_id, "Reaction added");
    });
    dispatcher.on_reaction_removed(|e| {
        tracing::debug!(channel_id = %e.broadcast.channel_id, "Reaction removed");
    });
    dispatcher.on_channel_viewed(|e| {
        tracing::debug!(data = %e.data, "Channel viewed");
    });
    dispatcher.subscribe_unrouted(|e| {
        tracing::debug!(event = %e.kind, "Unrouted event");
    });

    manager.connect(&config.server.url, &config.server.token)?;
    tracing::info!(server = %config.server.url, "Listening for events; press Ctrl+C to stop");

    shutdown_signal().await;

    tracing::info!("Shutdown signal received");
    tracing::info!(metrics = ?manager.metrics(), "Final counters");
    manager.dispose().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
