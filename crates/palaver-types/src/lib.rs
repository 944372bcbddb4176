//! Shared types for the palaver chat backend.

pub mod conversation;
pub mod message;
pub mod params;

pub use conversation::{Conversation, ConversationId, ConversationSummary, NewConversation, OwnerId};
pub use message::{Message, MessageId, PromptMessage, Role, Vote};
pub use params::GenerationParams;
