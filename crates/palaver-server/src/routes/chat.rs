//! Chat endpoints: submit, stream, list, messages, vote, delete.
//!
//! The streaming endpoint emits newline-delimited JSON
//! (`application/x-ndjson`), one turn event per line. Errors before the
//! first event map to a proper status; a mid-stream error terminates
//! the body.

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use palaver_chat::{SubmitTurn, VoteOutcome};
use palaver_types::{
    ConversationId, ConversationSummary, GenerationParams, Message, MessageId, Vote,
};

use crate::auth::Identity;
use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `POST /chats`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Absent for the first turn of a new conversation.
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Present when editing an existing message.
    #[serde(default)]
    pub message_id: Option<String>,

    /// The caller's belief about the edited message's position.
    #[serde(default)]
    pub message_index: Option<usize>,

    /// The user's message text.
    pub text: String,

    /// Generation parameters; absent means the baseline defaults.
    #[serde(default)]
    pub params: Option<GenerationParams>,
}

/// Response from `POST /chats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub conversation_id: String,
    pub message_id: String,
    /// Set only when this turn created the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Query for `GET /chats/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub chat_id: String,
}

/// Request body for `POST /chats/vote`.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub chat_id: String,
    pub message_id: String,
    /// `upvote` or `downvote`; anything else fails to parse.
    pub vote_type: Vote,
}

/// Response from `POST /chats/vote`.
#[derive(Debug, Serialize)]
pub struct VoteResponse {
    /// The vote now stored on the message, null when toggled off.
    pub vote: Option<Vote>,
}

/// Request body for `POST /chats/delete`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub chat_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chats - Persist the user's side of a turn.
pub async fn submit_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let receipt = state
        .chat
        .submit_turn(
            &identity.owner(),
            SubmitTurn {
                conversation_id: request.chat_id.as_deref().map(ConversationId::from),
                message_id: request.message_id.as_deref().map(MessageId::from),
                index_hint: request.message_index,
                text: request.text,
                params: request.params,
            },
        )
        .await?;

    Ok(Json(SubmitResponse {
        conversation_id: receipt.conversation_id.to_string(),
        message_id: receipt.message_id.to_string(),
        title: receipt.title,
    }))
}

/// GET /api/v1/chats/stream?chat_id= - NDJSON streaming turn endpoint.
pub async fn stream_handler(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ServerError> {
    let conversation_id = ConversationId::from(query.chat_id.as_str());
    let events = state
        .chat
        .stream_turn(&conversation_id, CancellationToken::new())
        .await?;

    let lines = events.map(|item| {
        let event = item.map_err(axum::Error::new)?;
        let mut line = serde_json::to_string(&event).map_err(axum::Error::new)?;
        line.push('\n');
        Ok::<_, axum::Error>(Bytes::from(line))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .map_err(|e| ServerError::Internal(e.to_string()))
}

/// GET /api/v1/chats - List the authenticated owner's conversations.
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    let listed = state.chat.list_conversations(&identity.owner()).await?;
    Ok(Json(listed))
}

/// GET /api/v1/chats/{id}/messages - Full message list of a conversation.
pub async fn messages_handler(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let messages = state
        .chat
        .conversation_messages(&ConversationId::from(id.as_str()))
        .await?;
    Ok(Json(messages))
}

/// POST /api/v1/chats/vote - Vote on a message.
///
/// An unknown `vote_type` is a 400: the closed enum rejects it at
/// deserialize.
pub async fn vote_handler(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let outcome = state
        .chat
        .vote(
            &ConversationId::from(request.chat_id.as_str()),
            &MessageId::from(request.message_id.as_str()),
            request.vote_type,
        )
        .await?;

    let vote = match outcome {
        VoteOutcome::Set(vote) => Some(vote),
        VoteOutcome::Cleared => None,
    };
    Ok(Json(VoteResponse { vote }))
}

/// POST /api/v1/chats/delete - Remove a conversation wholesale.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Json(request): Json<DeleteRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .chat
        .delete_conversation(&ConversationId::from(request.chat_id.as_str()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
