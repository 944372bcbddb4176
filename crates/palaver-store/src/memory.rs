//! In-memory conversation store.
//!
//! Backs tests and the server's database-less dev mode.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use palaver_types::{
    Conversation, ConversationId, ConversationSummary, GenerationParams, Message,
    NewConversation, OwnerId,
};

use crate::error::{Result, StoreError};
use crate::store::ConversationStore;

/// HashMap-backed store with the same contract as [`crate::SqliteStore`].
#[derive(Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.read().is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().get(id).cloned())
    }

    async fn insert(&self, conversation: NewConversation) -> Result<ConversationId> {
        let id = ConversationId::new();
        let stored = Conversation {
            id: id.clone(),
            owner_id: conversation.owner_id,
            title: conversation.title,
            messages: conversation.messages,
            params: conversation.params,
            updated_at: Utc::now(),
        };
        self.conversations.write().insert(id.clone(), stored);
        Ok(id)
    }

    async fn replace_messages(&self, id: &ConversationId, messages: Vec<Message>) -> Result<()> {
        let mut conversations = self.conversations.write();
        let conv = conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conv.messages = messages;
        conv.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_messages_and_touch(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        params: GenerationParams,
    ) -> Result<()> {
        let mut conversations = self.conversations.write();
        let conv = conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conv.messages = messages;
        conv.params = params;
        conv.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &ConversationId) -> Result<u64> {
        Ok(self.conversations.write().remove(id).map_or(0, |_| 1))
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .read()
            .values()
            .filter(|c| &c.owner_id == owner)
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                updated_at: c.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(owner: &str) -> NewConversation {
        NewConversation {
            owner_id: OwnerId::from(owner),
            title: "Test".to_string(),
            messages: vec![Message::user("hi")],
            params: GenerationParams::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let store = MemoryStore::new();
        let id = store.insert(sample("u1")).await.unwrap();
        assert!(store.find(&id).await.unwrap().is_some());
        assert_eq!(store.delete(&id).await.unwrap(), 1);
        assert_eq!(store.delete(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_missing() {
        let store = MemoryStore::new();
        let result = store
            .replace_messages(&ConversationId::from("nope"), vec![])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let store = MemoryStore::new();
        store.insert(sample("u1")).await.unwrap();
        store.insert(sample("u2")).await.unwrap();

        let listed = store.list_by_owner(&OwnerId::from("u1")).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
