//! Server configuration.

use std::net::SocketAddr;

/// Identity assigned to every request when no API tokens are configured.
pub const DEV_USER_ID: &str = "local";

/// A configured API token and the user it authenticates as.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub token: String,
    pub user_id: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Configured API tokens. Empty means auth is disabled and every
    /// request runs as [`DEV_USER_ID`] (single-user dev mode).
    pub tokens: Vec<ApiToken>,

    /// CORS allowed origins (empty = no CORS layer).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("static address"),
            tokens: Vec::new(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Register a token that authenticates as the given user.
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.push(ApiToken {
            token: token.into(),
            user_id: user_id.into(),
        });
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Whether requests must present a token.
    pub fn auth_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_dev_mode() {
        let config = ServerConfig::default();
        assert!(!config.auth_enabled());
        assert_eq!(config.bind_address.port(), 8080);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_token("secret", "alice");
        assert!(config.auth_enabled());
        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.tokens[0].user_id, "alice");
    }
}
