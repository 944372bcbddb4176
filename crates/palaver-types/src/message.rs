//! Message types for conversations.
//!
//! A message's position in its conversation's list IS the causal order;
//! there is no per-message timestamp field.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role in a conversation. Closed two-value set — there is no system or
/// tool role in this document model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name for the completion provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A reader's vote on an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Upvote,
    Downvote,
}

/// Message identifier, unique within its conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Mint a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A message in a conversation.
///
/// `completion_tokens` and `response_time` are present only on assistant
/// messages; user messages never carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    /// Wall-clock generation latency in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
}

impl Message {
    /// Create a new user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            completion_tokens: None,
            response_time: None,
            vote: None,
        }
    }

    /// Create an assistant message with its generation metrics.
    pub fn assistant(
        id: MessageId,
        content: impl Into<String>,
        completion_tokens: u32,
        response_time: f64,
    ) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            completion_tokens: Some(completion_tokens),
            response_time: Some(response_time),
            vote: None,
        }
    }

    /// The `{role, content}` projection sent to the completion provider.
    pub fn to_prompt(&self) -> PromptMessage {
        PromptMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A derived `{role, content}` pair of the effective prompt.
///
/// Never persisted; recomputed fresh for every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result: Result<Role, _> = serde_json::from_str("\"system\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_vote_rejected() {
        let result: Result<Vote, _> = serde_json::from_str("\"sideways\"");
        assert!(result.is_err());
        assert_eq!(
            serde_json::from_str::<Vote>("\"upvote\"").unwrap(),
            Vote::Upvote
        );
    }

    #[test]
    fn test_user_message_omits_metrics() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("completion_tokens").is_none());
        assert!(json.get("response_time").is_none());
        assert!(json.get("vote").is_none());
    }

    #[test]
    fn test_assistant_message_carries_metrics() {
        let msg = Message::assistant(MessageId::from("m1"), "hi", 12, 0.75);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["message_id"], "m1");
        assert_eq!(json["completion_tokens"], 12);
        assert_eq!(json["response_time"], 0.75);
    }

    #[test]
    fn test_message_ids_are_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn test_to_prompt_projects_role_and_content() {
        let msg = Message::user("what is up");
        let prompt = msg.to_prompt();
        assert_eq!(prompt, PromptMessage::new(Role::User, "what is up"));
    }
}
