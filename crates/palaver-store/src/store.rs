//! The conversation store contract.

use std::sync::Arc;

use async_trait::async_trait;

use palaver_types::{
    Conversation, ConversationId, ConversationSummary, GenerationParams, Message,
    NewConversation, OwnerId,
};

use crate::error::Result;

/// Keyed-document persistence for conversations.
///
/// All mutation paths are read-then-replace-whole-list; the store itself
/// offers no field-level append.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Look up a conversation by id.
    async fn find(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Insert a new conversation and return its store-assigned id.
    async fn insert(&self, conversation: NewConversation) -> Result<ConversationId>;

    /// Replace the message list and bump `updated_at`.
    ///
    /// Returns `NotFound` if the conversation does not exist.
    async fn replace_messages(&self, id: &ConversationId, messages: Vec<Message>) -> Result<()>;

    /// Replace the message list and generation parameters, and bump
    /// `updated_at`. Parameters are overwritten wholesale.
    async fn replace_messages_and_touch(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        params: GenerationParams,
    ) -> Result<()>;

    /// Remove a conversation document. Returns the number removed (0 or 1).
    async fn delete(&self, id: &ConversationId) -> Result<u64>;

    /// List an owner's conversations, most recently updated first.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ConversationSummary>>;
}

/// A store that can be shared across tasks.
pub type SharedStore = Arc<dyn ConversationStore>;
