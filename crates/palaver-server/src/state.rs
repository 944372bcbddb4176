//! Shared application state.

use std::sync::Arc;

use palaver_chat::ChatService;

use crate::config::ServerConfig;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The chat core.
    pub chat: Arc<ChatService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(chat: ChatService, config: ServerConfig) -> Self {
        Self {
            chat: Arc::new(chat),
            config: Arc::new(config),
        }
    }
}
