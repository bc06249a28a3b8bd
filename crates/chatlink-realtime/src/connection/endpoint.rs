//! Websocket endpoint derivation from the configured server URL.

use chatlink_core::{AppError, AppResult};

/// Builds the websocket URL for `server_url`.
///
/// Trailing slashes are stripped, `https` becomes `wss` and `http` becomes
/// `ws` (a URL already using `ws`/`wss` keeps its scheme), then `api_path`
/// is appended.
pub fn websocket_url(server_url: &str, api_path: &str) -> AppResult<String> {
    let trimmed = server_url.trim().trim_end_matches('/');

    let (scheme, rest) = trimmed.split_once("://").ok_or_else(|| {
        AppError::validation(format!("Server URL has no scheme: '{server_url}'"))
    })?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(AppError::validation(format!(
                "Unsupported server URL scheme '{other}'"
            )));
        }
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(AppError::validation(format!(
            "Server URL has no host: '{server_url}'"
        )));
    }

    Ok(format!("{ws_scheme}://{rest}{api_path}"))
}
