//! Collaboration server connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which collaboration server to connect to and with what token.
///
/// Both fields may be left empty in the file and supplied on the command
/// line or through `CHATLINK__SERVER__URL` / `CHATLINK__SERVER__TOKEN`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server, e.g. `https://chat.example.com`.
    #[serde(default)]
    pub url: String,
    /// Personal access or session token.
    #[serde(default)]
    pub token: String,
}

impl ServerConfig {
    /// Returns the token with everything but the first four characters masked.
    pub fn masked_token(&self) -> String {
        if self.token.is_empty() {
            return String::new();
        }
        let visible: String = self.token.chars().take(4).collect();
        format!("{visible}****")
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("token", &self.masked_token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_token() {
        let config = ServerConfig {
            url: "https://chat.example.com".to_string(),
            token: "abcdefghijkl".to_string(),
        };
        let printed = format!("{config:?}");
        assert!(printed.contains("abcd****"));
        assert!(!printed.contains("abcdefghijkl"));
    }

    #[test]
    fn test_masked_token_empty() {
        assert_eq!(ServerConfig::default().masked_token(), "");
    }
}
