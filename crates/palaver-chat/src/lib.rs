//! Chat core for the palaver backend.
//!
//! Everything between the HTTP layer and the store/provider seams lives
//! here: planning a turn's message list, orchestrating the streaming
//! generation, committing the transcript, and the vote/delete paths
//! with their notification channel.

pub mod error;
pub mod events;
pub mod history;
pub mod moderation;
pub mod notify;
pub mod orchestrator;

pub use error::{ChatError, Result};
pub use events::StreamEvent;
pub use history::{TurnKind, TurnPlan, plan_turn};
pub use moderation::VoteOutcome;
pub use notify::{BroadcastNotifier, Notification, Notifier, NotifyError};
pub use orchestrator::{ChatService, EventStream, SubmitTurn, TurnReceipt};
