//! History editing: planning the message list for a submitted turn.
//!
//! Pure functions only; no store or provider calls. The orchestrator
//! persists whatever plan comes out of here.

use palaver_types::{Conversation, Message, MessageId, PromptMessage};

use crate::error::{ChatError, Result};

/// What kind of turn the caller submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    /// Append a new user message to the end of the history.
    Fresh,
    /// Rewrite an existing user message and resubmit from that point.
    ///
    /// The hint is the caller's belief about the message's position. An
    /// in-range hint is trusted verbatim; only an out-of-range hint falls
    /// back to a scan by id.
    Edit {
        message_id: MessageId,
        index_hint: Option<usize>,
    },
}

/// The planned message list for one turn.
#[derive(Debug, Clone)]
pub struct TurnPlan {
    /// Full history to persist, ending with the (new or edited) user turn.
    pub messages: Vec<Message>,
    /// Id of the message carrying the submitted text.
    pub message_id: MessageId,
    /// The effective prompt: `{role, content}` projection of `messages`.
    pub prompt: Vec<PromptMessage>,
}

/// Plan the message list for a turn.
///
/// `Fresh` appends; `Edit` replaces the target's content in place and
/// truncates the history to end at the target, discarding every later
/// message including prior assistant replies.
pub fn plan_turn(
    conversation: Option<&Conversation>,
    kind: &TurnKind,
    text: &str,
) -> Result<TurnPlan> {
    if text.trim().is_empty() {
        return Err(ChatError::validation("message text must not be empty"));
    }

    match kind {
        TurnKind::Fresh => {
            let mut messages = conversation.map(|c| c.messages.clone()).unwrap_or_default();
            let message = Message::user(text);
            let message_id = message.id.clone();
            messages.push(message);
            Ok(plan_from(messages, message_id))
        }
        TurnKind::Edit {
            message_id,
            index_hint,
        } => {
            let conversation = conversation.ok_or_else(|| {
                ChatError::not_found("conversation", message_id.as_str())
            })?;
            let mut messages = conversation.messages.clone();

            let index = locate(&messages, message_id, *index_hint).ok_or_else(|| {
                ChatError::not_found("message", message_id.as_str())
            })?;

            messages[index].content = text.to_string();
            messages.truncate(index + 1);

            let message_id = messages[index].id.clone();
            Ok(plan_from(messages, message_id))
        }
    }
}

/// Resolve an edit target: in-range hints win, out-of-range hints fall
/// back to an id scan.
fn locate(messages: &[Message], id: &MessageId, hint: Option<usize>) -> Option<usize> {
    if let Some(index) = hint {
        if index < messages.len() {
            return Some(index);
        }
    }
    messages.iter().position(|m| &m.id == id)
}

fn plan_from(messages: Vec<Message>, message_id: MessageId) -> TurnPlan {
    let prompt = messages.iter().map(Message::to_prompt).collect();
    TurnPlan {
        messages,
        message_id,
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use palaver_types::{ConversationId, GenerationParams, OwnerId, Role};

    fn conversation(messages: Vec<Message>) -> Conversation {
        Conversation {
            id: ConversationId::from("c1"),
            owner_id: OwnerId::from("u1"),
            title: "Test".to_string(),
            messages,
            params: GenerationParams::default(),
            updated_at: Utc::now(),
        }
    }

    fn assistant(id: &str, content: &str) -> Message {
        Message::assistant(MessageId::from(id), content, 5, 0.2)
    }

    #[test]
    fn test_fresh_turn_starts_history() {
        let plan = plan_turn(None, &TurnKind::Fresh, "hello").unwrap();
        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].role, Role::User);
        assert_eq!(plan.messages[0].content, "hello");
        assert_eq!(plan.message_id, plan.messages[0].id);
        assert_eq!(plan.prompt.len(), 1);
    }

    #[test]
    fn test_fresh_turn_appends_without_removing() {
        let conv = conversation(vec![Message::user("first"), assistant("a1", "reply")]);
        let plan = plan_turn(Some(&conv), &TurnKind::Fresh, "second").unwrap();

        assert_eq!(plan.messages.len(), 3);
        assert_eq!(plan.messages[0].content, "first");
        assert_eq!(plan.messages[1].content, "reply");
        assert_eq!(plan.messages[2].content, "second");
    }

    #[test]
    fn test_edit_truncates_later_messages() {
        let conv = conversation(vec![
            Message::user("first"),
            assistant("a1", "reply one"),
            Message::user("second"),
            assistant("a2", "reply two"),
        ]);
        let target = conv.messages[0].id.clone();

        let plan = plan_turn(
            Some(&conv),
            &TurnKind::Edit {
                message_id: target.clone(),
                index_hint: None,
            },
            "first, revised",
        )
        .unwrap();

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].content, "first, revised");
        assert_eq!(plan.message_id, target);
        assert_eq!(plan.prompt.len(), 1);
        assert_eq!(plan.prompt[0].content, "first, revised");
    }

    #[test]
    fn test_edit_keeps_earlier_messages() {
        let conv = conversation(vec![
            Message::user("first"),
            assistant("a1", "reply one"),
            Message::user("second"),
            assistant("a2", "reply two"),
        ]);
        let target = conv.messages[2].id.clone();

        let plan = plan_turn(
            Some(&conv),
            &TurnKind::Edit {
                message_id: target,
                index_hint: Some(2),
            },
            "second, revised",
        )
        .unwrap();

        assert_eq!(plan.messages.len(), 3);
        assert_eq!(plan.messages[1].content, "reply one");
        assert_eq!(plan.messages[2].content, "second, revised");
    }

    #[test]
    fn test_in_range_hint_wins_over_id() {
        // The hint points at a different message than the id names; the
        // hint is trusted because it is in range.
        let conv = conversation(vec![Message::user("first"), Message::user("second")]);
        let id_of_second = conv.messages[1].id.clone();

        let plan = plan_turn(
            Some(&conv),
            &TurnKind::Edit {
                message_id: id_of_second,
                index_hint: Some(0),
            },
            "rewritten",
        )
        .unwrap();

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].content, "rewritten");
        assert_eq!(plan.message_id, conv.messages[0].id);
    }

    #[test]
    fn test_out_of_range_hint_falls_back_to_id_scan() {
        let conv = conversation(vec![Message::user("first"), Message::user("second")]);
        let target = conv.messages[1].id.clone();

        let plan = plan_turn(
            Some(&conv),
            &TurnKind::Edit {
                message_id: target.clone(),
                index_hint: Some(99),
            },
            "rewritten",
        )
        .unwrap();

        assert_eq!(plan.messages.len(), 2);
        assert_eq!(plan.message_id, target);
    }

    #[test]
    fn test_edit_unknown_message_is_not_found() {
        let conv = conversation(vec![Message::user("first")]);
        let result = plan_turn(
            Some(&conv),
            &TurnKind::Edit {
                message_id: MessageId::from("missing"),
                index_hint: None,
            },
            "text",
        );
        assert!(matches!(
            result,
            Err(ChatError::NotFound {
                entity: "message",
                ..
            })
        ));
    }

    #[test]
    fn test_edit_without_conversation_is_not_found() {
        let result = plan_turn(
            None,
            &TurnKind::Edit {
                message_id: MessageId::from("m1"),
                index_hint: None,
            },
            "text",
        );
        assert!(matches!(result, Err(ChatError::NotFound { .. })));
    }

    #[test]
    fn test_blank_text_is_rejected() {
        assert!(matches!(
            plan_turn(None, &TurnKind::Fresh, "   \n"),
            Err(ChatError::Validation(_))
        ));
    }
}
