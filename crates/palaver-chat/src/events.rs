//! Streaming turn events.
//!
//! These serialize directly onto the wire, one JSON object per line, so
//! the field and tag names here ARE the protocol.

use serde::{Deserialize, Serialize};

use palaver_types::MessageId;

/// One event of a streaming turn.
///
/// A stream that completes emits exactly one `Start`, zero or more
/// `Message`s, and one `Complete`, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The turn is accepted; `message_id` names the assistant message
    /// that all later events (and the persisted result) refer to.
    Start { message_id: MessageId },

    /// One incremental piece of assistant output. Never empty.
    Message {
        message_id: MessageId,
        content: String,
    },

    /// The turn finished; the transcript is durable once this is emitted.
    Complete {
        message_id: MessageId,
        completion_tokens: u32,
        /// Wall-clock generation latency in seconds.
        response_time: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_wire_shape() {
        let event = StreamEvent::Start {
            message_id: MessageId::from("m1"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "start");
        assert_eq!(json["message_id"], "m1");
    }

    #[test]
    fn test_message_wire_shape() {
        let event = StreamEvent::Message {
            message_id: MessageId::from("m1"),
            content: "Par".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message");
        assert_eq!(json["content"], "Par");
    }

    #[test]
    fn test_complete_wire_shape() {
        let event = StreamEvent::Complete {
            message_id: MessageId::from("m1"),
            completion_tokens: 42,
            response_time: 1.25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "complete");
        assert_eq!(json["completion_tokens"], 42);
        assert_eq!(json["response_time"], 1.25);
    }
}
