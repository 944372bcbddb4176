//! Turn orchestration: submit, then stream.
//!
//! A turn is two calls. `submit_turn` persists the user's side (append
//! or edit) and returns a receipt; `stream_turn` generates the
//! assistant's side, emitting events as fragments arrive and committing
//! the transcript exactly once at the end.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use palaver_llm::{CompletionRequest, Fragment, SharedClient, TokenCounter};
use palaver_store::SharedStore;
use palaver_types::{
    Conversation, ConversationId, ConversationSummary, GenerationParams, Message, MessageId,
    NewConversation, OwnerId, PromptMessage, Role,
};

use crate::error::{ChatError, Result};
use crate::events::StreamEvent;
use crate::history::{self, TurnKind};
use crate::notify::Notifier;

/// Title generation runs one short non-streaming completion.
const TITLE_TEMPERATURE: f32 = 0.5;
const TITLE_TOP_P: f32 = 0.95;
const TITLE_MAX_TOKENS: u32 = 10;

/// The events of one streaming turn.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'static>>;

/// A submitted turn: a fresh message, or an edit of an existing one.
#[derive(Debug, Clone)]
pub struct SubmitTurn {
    /// Absent for the first turn of a new conversation.
    pub conversation_id: Option<ConversationId>,
    /// Present when the caller is editing an existing message.
    pub message_id: Option<MessageId>,
    /// The caller's belief about the edited message's position.
    pub index_hint: Option<usize>,
    pub text: String,
    /// Replaces the stored parameters wholesale; absent means the
    /// service defaults.
    pub params: Option<GenerationParams>,
}

/// What `submit_turn` persisted.
#[derive(Debug, Clone)]
pub struct TurnReceipt {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    /// Set only when this turn created the conversation.
    pub title: Option<String>,
}

/// The chat core service.
///
/// Holds the store, the completion client, the token counter and the
/// optional notification channel. Clone-cheap via `Arc` fields.
pub struct ChatService {
    store: SharedStore,
    client: SharedClient,
    token_counter: TokenCounter,
    /// Used when a submitted turn carries no explicit parameters.
    default_params: GenerationParams,
    notifier: Option<Arc<dyn Notifier>>,
    /// Per-conversation commit locks, so the read-modify-write around a
    /// transcript commit never interleaves for one conversation id.
    commit_locks: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatService {
    pub fn new(store: SharedStore, client: SharedClient) -> Self {
        Self {
            store,
            client,
            token_counter: TokenCounter::new(),
            default_params: GenerationParams::default(),
            notifier: None,
            commit_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the parameters used when a turn supplies none.
    pub fn with_default_params(mut self, params: GenerationParams) -> Self {
        self.default_params = params;
        self
    }

    pub(crate) fn store(&self) -> &SharedStore {
        &self.store
    }

    pub(crate) fn notifier(&self) -> Option<&Arc<dyn Notifier>> {
        self.notifier.as_ref()
    }

    fn commit_lock(&self, id: &ConversationId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.commit_locks.lock();
        locks.entry(id.clone()).or_default().clone()
    }

    /// Drops the commit lock for a conversation that no longer exists.
    /// In-flight holders keep their `Arc` clone; the registry just stops
    /// handing the entry out.
    pub(crate) fn release_commit_lock(&self, id: &ConversationId) {
        self.commit_locks.lock().remove(id);
    }

    #[cfg(test)]
    pub(crate) fn commit_lock_count(&self) -> usize {
        self.commit_locks.lock().len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Submit
    // ─────────────────────────────────────────────────────────────────────

    /// Persist the user's side of a turn.
    ///
    /// A fresh conversation gets a generated title and an insert; an
    /// existing one gets its message list and parameters replaced. Title
    /// generation failure persists nothing.
    pub async fn submit_turn(&self, owner: &OwnerId, turn: SubmitTurn) -> Result<TurnReceipt> {
        let conversation = match &turn.conversation_id {
            Some(id) => Some(
                self.store
                    .find(id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("conversation", id.as_str()))?,
            ),
            None => None,
        };

        let kind = match turn.message_id {
            Some(message_id) => TurnKind::Edit {
                message_id,
                index_hint: turn.index_hint,
            },
            None => TurnKind::Fresh,
        };
        let plan = history::plan_turn(conversation.as_ref(), &kind, &turn.text)?;
        let params = turn
            .params
            .unwrap_or_else(|| self.default_params.clone());

        match conversation {
            Some(conversation) => {
                self.store
                    .replace_messages_and_touch(&conversation.id, plan.messages, params)
                    .await?;
                Ok(TurnReceipt {
                    conversation_id: conversation.id,
                    message_id: plan.message_id,
                    title: None,
                })
            }
            None => {
                let title = self.generate_title(&turn.text, &params.model).await?;
                let conversation_id = self
                    .store
                    .insert(NewConversation {
                        owner_id: owner.clone(),
                        title: title.clone(),
                        messages: plan.messages,
                        params,
                    })
                    .await?;
                tracing::info!(%conversation_id, %owner, "created conversation");
                Ok(TurnReceipt {
                    conversation_id,
                    message_id: plan.message_id,
                    title: Some(title),
                })
            }
        }
    }

    async fn generate_title(&self, text: &str, model: &str) -> Result<String> {
        let prompt = vec![PromptMessage::new(
            Role::User,
            format!("Write a very short title, a few words at most, for a conversation that begins with this message. Reply with the title only.\n\n{text}"),
        )];
        let request = CompletionRequest::new(model, prompt, TITLE_MAX_TOKENS)
            .with_temperature(TITLE_TEMPERATURE)
            .with_top_p(TITLE_TOP_P);
        let title = self.client.complete(request).await?;
        Ok(title.trim().trim_matches('"').to_string())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stream
    // ─────────────────────────────────────────────────────────────────────

    /// Generate the assistant's side of the conversation's latest turn.
    ///
    /// Returns `Err` before any event when the conversation is unknown or
    /// the provider rejects the request (credentials map to
    /// [`ChatError::Authorization`]). On success the stream yields
    /// `Start`, then a `Message` per non-empty fragment, then `Complete`
    /// once the transcript is durable. A mid-stream provider failure
    /// yields the mapped error and ends the stream with the store
    /// untouched; cancellation ends it silently, also without a commit.
    pub async fn stream_turn(
        &self,
        conversation_id: &ConversationId,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        let conversation = self
            .store
            .find(conversation_id)
            .await?
            .ok_or_else(|| ChatError::not_found("conversation", conversation_id.as_str()))?;

        let prompt: Vec<PromptMessage> =
            conversation.messages.iter().map(Message::to_prompt).collect();
        let request = CompletionRequest::from_params(&conversation.params, prompt);

        tracing::debug!(
            %conversation_id,
            model = %request.model,
            messages = request.messages.len(),
            "starting streaming turn"
        );
        let mut upstream = self.client.stream_complete(request).await?;

        let message_id = MessageId::new();
        let conversation_id = conversation_id.clone();
        let store = Arc::clone(&self.store);
        let counter = self.token_counter;
        let lock = self.commit_lock(&conversation_id);

        let events = stream! {
            let started = Instant::now();
            yield Ok(StreamEvent::Start { message_id: message_id.clone() });

            let mut accumulated = String::new();
            let mut completion_tokens: u32 = 0;

            loop {
                if cancel.is_cancelled() {
                    tracing::debug!(%conversation_id, "streaming turn cancelled");
                    return;
                }
                let Some(item) = upstream.next().await else {
                    break;
                };
                match item {
                    Ok(Fragment::Content(content)) => {
                        if content.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&content);
                        // Each fragment is tokenized on its own and the
                        // counts summed, which can differ from tokenizing
                        // the joined text.
                        completion_tokens =
                            completion_tokens.saturating_add(counter.count(&content));
                        yield Ok(StreamEvent::Message {
                            message_id: message_id.clone(),
                            content,
                        });
                    }
                    Ok(Fragment::Usage(usage)) => {
                        // The running fragment count stays authoritative
                        // for the persisted metric.
                        tracing::debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "provider usage report"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(%conversation_id, error = %err, "streaming turn failed");
                        yield Err(ChatError::from(err));
                        return;
                    }
                }
            }

            let response_time = started.elapsed().as_secs_f64();

            // Single commit, under this conversation's lock. Durable
            // before the caller ever sees `Complete`.
            let commit = async {
                let _guard = lock.lock().await;
                let current = store
                    .find(&conversation_id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("conversation", conversation_id.as_str()))?;
                let mut messages = current.messages;
                messages.push(Message::assistant(
                    message_id.clone(),
                    accumulated,
                    completion_tokens,
                    response_time,
                ));
                store.replace_messages(&conversation_id, messages).await?;
                Ok::<_, ChatError>(())
            };
            if let Err(err) = commit.await {
                tracing::error!(%conversation_id, error = %err, "transcript commit failed");
                yield Err(err);
                return;
            }

            tracing::info!(
                %conversation_id,
                %message_id,
                completion_tokens,
                response_time,
                "streaming turn committed"
            );
            yield Ok(StreamEvent::Complete {
                message_id,
                completion_tokens,
                response_time,
            });
        };

        Ok(Box::pin(events))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub async fn conversation_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let conversation = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| ChatError::not_found("conversation", id.as_str()))?;
        Ok(conversation.messages)
    }

    pub async fn list_conversations(&self, owner: &OwnerId) -> Result<Vec<ConversationSummary>> {
        Ok(self.store.list_by_owner(owner).await?)
    }

    pub(crate) async fn load(&self, id: &ConversationId) -> Result<Conversation> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| ChatError::not_found("conversation", id.as_str()))
    }
}
