//! Client configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::{DEFAULT_CHAT_PATH, websocket_url};
use crate::cli::ReconnectPolicy;
use crate::session::{FileTokenStorage, TokenStore};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_WS_HOST: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_DIR: &str = ".castline";

/// Endpoints and local paths of one client instance
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL every API path is appended to
    pub api_base_url: String,
    /// Host (and port) of the chat endpoint
    pub ws_host: String,
    pub ws_path: String,
    /// Use `wss` for the chat endpoint
    pub secure: bool,
    /// Directory holding the persisted session
    pub session_dir: PathBuf,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_host: DEFAULT_WS_HOST.to_string(),
            ws_path: DEFAULT_CHAT_PATH.to_string(),
            secure: false,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Full URL of the chat endpoint
    pub fn chat_url(&self) -> String {
        websocket_url(self.secure, &self.ws_host, &self.ws_path)
    }

    /// Token store persisted under [`ClientConfig::session_dir`]
    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(Arc::new(FileTokenStorage::new(self.session_dir.clone())))
    }
}
