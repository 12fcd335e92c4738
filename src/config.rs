//! Engine configuration.
//!
//! Everything that varies between deployments (endpoints, bounds, delays)
//! is collected here and injected into the engine at construction time, so
//! tests can run against an in-process backend with short delays.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::value_object::ConnectionToken;

/// Maximum number of messages retained per room
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Delay before a reconnection attempt after an abnormal close
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Age after which a typing entry is considered stale.
///
/// Senders refresh their typing state roughly every 2 seconds while the
/// user keeps typing, so 5 seconds covers a missed refresh plus slack.
pub const DEFAULT_TYPING_TTL: Duration = Duration::from_secs(5);

/// Configuration for a [`SessionEngine`](crate::session::SessionEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST backend (e.g. `http://127.0.0.1:8000`)
    pub api_base_url: String,
    /// Base URL of the websocket endpoint (e.g. `ws://127.0.0.1:8000/ws`)
    pub ws_base_url: String,
    /// Where the message store snapshot is written; `None` disables file storage
    pub storage_path: Option<PathBuf>,
    /// Maximum number of messages retained per room
    pub history_cap: usize,
    /// Delay before a reconnection attempt after an abnormal close
    pub reconnect_delay: Duration,
    /// Age after which a typing entry is considered stale
    pub typing_ttl: Duration,
    /// Use a fixed placeholder connection token when the backend cannot
    /// issue one (local development without a real backend)
    pub dev_fallback_token: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            ws_base_url: "ws://127.0.0.1:8000/ws".to_string(),
            storage_path: None,
            history_cap: DEFAULT_HISTORY_CAP,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            typing_ttl: DEFAULT_TYPING_TTL,
            dev_fallback_token: false,
        }
    }
}

impl EngineConfig {
    /// Build the websocket URL for a connection token.
    ///
    /// The token is the only credential the chat gateway sees; the path
    /// shape is fixed by the backend (`{ws_base}/chat/{token}`).
    pub fn chat_endpoint(&self, token: &ConnectionToken) -> String {
        format!(
            "{}/chat/{}",
            self.ws_base_url.trim_end_matches('/'),
            token.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_endpoint_appends_token_to_base() {
        // テスト項目: websocket URL がベース URL とトークンから組み立てられる
        // given (前提条件):
        let config = EngineConfig {
            ws_base_url: "ws://127.0.0.1:8000/ws".to_string(),
            ..EngineConfig::default()
        };
        let token = ConnectionToken::new("abc123".to_string()).unwrap();

        // when (操作):
        let url = config.chat_endpoint(&token);

        // then (期待する結果):
        assert_eq!(url, "ws://127.0.0.1:8000/ws/chat/abc123");
    }

    #[test]
    fn test_chat_endpoint_normalizes_trailing_slash() {
        // テスト項目: ベース URL 末尾のスラッシュが重複しない
        // given (前提条件):
        let config = EngineConfig {
            ws_base_url: "ws://127.0.0.1:8000/ws/".to_string(),
            ..EngineConfig::default()
        };
        let token = ConnectionToken::new("abc123".to_string()).unwrap();

        // when (操作):
        let url = config.chat_endpoint(&token);

        // then (期待する結果):
        assert_eq!(url, "ws://127.0.0.1:8000/ws/chat/abc123");
    }
}
