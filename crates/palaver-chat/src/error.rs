//! Chat core error taxonomy.

use palaver_llm::ClientError;
use palaver_store::StoreError;

/// Errors surfaced by the chat core.
///
/// Every variant except `Configuration` means no data was mutated by the
/// failing call. `Configuration` is raised by vote/delete AFTER their data
/// effect has applied, when the notification channel is missing.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A required field was absent or empty.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced conversation or message does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The completion provider rejected our credentials.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The completion provider failed in some other way.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// The service is missing a required collaborator.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Persistence failure.
    #[error("store failure: {0}")]
    Store(StoreError),
}

impl ChatError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ChatError::not_found("conversation", id),
            other => ChatError::Store(other),
        }
    }
}

impl From<ClientError> for ChatError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Auth(detail) => ChatError::Authorization(detail),
            other => ChatError::Upstream(other.to_string()),
        }
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_becomes_chat_not_found() {
        let err: ChatError = StoreError::NotFound("c1".to_string()).into();
        assert!(matches!(
            err,
            ChatError::NotFound {
                entity: "conversation",
                ..
            }
        ));
    }

    #[test]
    fn test_client_auth_maps_to_authorization() {
        let err: ChatError = ClientError::Auth("bad key".to_string()).into();
        assert!(matches!(err, ChatError::Authorization(_)));

        let err: ChatError = ClientError::Upstream("500".to_string()).into();
        assert!(matches!(err, ChatError::Upstream(_)));
    }
}
