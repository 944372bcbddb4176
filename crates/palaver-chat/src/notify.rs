//! Notification channel for moderation events.
//!
//! Vote and delete publish out-of-band updates so other sessions of the
//! same user can refresh. The channel is injected at service
//! construction; there is no process-global hook.

use async_trait::async_trait;
use serde_json::Value;

/// Failure to publish a notification.
#[derive(Debug, thiserror::Error)]
#[error("notification publish failed: {0}")]
pub struct NotifyError(pub String);

/// A fire-and-forget publish channel for moderation events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError>;
}

/// A published notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// In-process fanout over a tokio broadcast channel.
///
/// Subscribers that lag simply miss messages; moderation events are
/// advisory and the document store stays authoritative.
pub struct BroadcastNotifier {
    sender: tokio::sync::broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError> {
        // A send error only means nobody is subscribed right now.
        let _ = self.sender.send(Notification {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Test notifier that records everything it is asked to publish.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    published: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError> {
        self.published.lock().unwrap().push(Notification {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
