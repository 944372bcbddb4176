//! Vote and delete operations.
//!
//! Both mutate the store FIRST and notify second: a missing or failing
//! notification channel surfaces as [`ChatError::Configuration`] after
//! the data effect has already applied. That asymmetry is the contract.

use serde_json::json;

use palaver_types::{ConversationId, MessageId, Vote};

use crate::error::{ChatError, Result};
use crate::orchestrator::ChatService;

/// What a vote request did to the stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote is now set to this value.
    Set(Vote),
    /// The request matched the stored vote and toggled it off.
    Cleared,
}

impl ChatService {
    /// Apply a vote to a message: same value toggles off, anything else
    /// sets (overwriting an opposite vote).
    pub async fn vote(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        vote: Vote,
    ) -> Result<VoteOutcome> {
        let conversation = self.load(conversation_id).await?;
        let mut messages = conversation.messages;

        let target = messages
            .iter_mut()
            .find(|m| &m.id == message_id)
            .ok_or_else(|| ChatError::not_found("message", message_id.as_str()))?;

        let outcome = if target.vote == Some(vote) {
            target.vote = None;
            VoteOutcome::Cleared
        } else {
            target.vote = Some(vote);
            VoteOutcome::Set(vote)
        };

        self.store()
            .replace_messages(conversation_id, messages)
            .await?;
        tracing::info!(%conversation_id, %message_id, ?outcome, "vote applied");

        // The notification carries the requested vote, even on a toggle-off;
        // subscribers see which button was pressed, not the stored state.
        self.notify(
            "vote_update",
            json!({
                "conversation_id": conversation_id,
                "message_id": message_id,
                "vote": vote,
            }),
        )
        .await?;

        Ok(outcome)
    }

    /// Remove a conversation wholesale.
    pub async fn delete_conversation(&self, conversation_id: &ConversationId) -> Result<()> {
        let removed = self.store().delete(conversation_id).await?;
        if removed == 0 {
            return Err(ChatError::not_found(
                "conversation",
                conversation_id.as_str(),
            ));
        }
        self.release_commit_lock(conversation_id);
        tracing::info!(%conversation_id, "conversation deleted");

        self.notify(
            "chat_deleted",
            json!({ "conversation_id": conversation_id }),
        )
        .await
    }

    async fn notify(&self, topic: &str, payload: serde_json::Value) -> Result<()> {
        let notifier = self.notifier().ok_or_else(|| {
            ChatError::Configuration("notification channel not configured".to_string())
        })?;
        notifier
            .publish(topic, payload)
            .await
            .map_err(|e| ChatError::Configuration(e.to_string()))
    }
}
