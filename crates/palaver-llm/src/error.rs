//! Error types for the completion client.

use thiserror::Error;

/// Result type alias using the client error type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for completion-provider operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provider rejected the credentials. Surfaced distinctly so
    /// callers can prompt for re-auth.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Any other provider-side failure.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, bad base URL, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// True if the provider rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ClientError::Network(format!("Connection failed: {}", err))
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth() {
        assert!(ClientError::Auth("bad key".to_string()).is_auth());
        assert!(!ClientError::Upstream("server error".to_string()).is_auth());
        assert!(!ClientError::Network("timeout".to_string()).is_auth());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Serialization(_)));
    }
}
