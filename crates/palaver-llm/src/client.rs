//! Completion client trait and mock implementation.
//!
//! The trait is the seam between the chat core and whichever provider
//! actually generates text; the mock makes the streaming turn loop
//! deterministic in tests.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use palaver_types::{GenerationParams, PromptMessage};

use crate::error::{ClientError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// A completion request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use for completion.
    pub model: String,

    /// The effective prompt: ordered role/content pairs.
    pub messages: Vec<PromptMessage>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Whether to stream the response.
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a new request with the given model and prompt.
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            temperature: None,
            top_p: None,
            repetition_penalty: None,
            stream: false,
        }
    }

    /// Build a streaming request from a conversation's generation parameters.
    pub fn from_params(params: &GenerationParams, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: params.model.clone(),
            messages,
            max_tokens: params.output_length,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            repetition_penalty: Some(params.repetition_penalty),
            stream: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal usage/cost signal as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSignal {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One item of a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// An incremental piece of assistant output.
    Content(String),
    /// The provider's terminal usage report.
    Usage(UsageSignal),
}

impl Fragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }
}

/// A lazy, finite sequence of fragments. Not restartable: once consumed
/// or aborted, a retry requires a fresh `stream_complete` call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Completion Client Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Execute a completion request and return the full response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Execute a completion request and return a stream of fragments.
    async fn stream_complete(&self, request: CompletionRequest) -> Result<FragmentStream>;

    /// Name of this client, for logging.
    fn name(&self) -> &str;
}

/// A client that can be shared across tasks.
pub type SharedClient = Arc<dyn CompletionClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────────────────

/// A mock client for testing.
///
/// Streams a scripted fragment sequence and answers non-streaming calls
/// from a scripted response list, logging every request it sees.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct MockClient {
    name: String,
    fragments: std::sync::Mutex<Vec<Result<Fragment>>>,
    completions: std::sync::Mutex<Vec<Result<String>>>,
    stream_call_error: std::sync::Mutex<Option<ClientError>>,
    request_log: std::sync::Mutex<Vec<CompletionRequest>>,
}

#[cfg(any(test, feature = "testing"))]
impl MockClient {
    /// Create a mock that streams the given text fragments in order.
    pub fn with_fragments(fragments: Vec<&str>) -> Self {
        Self::with_items(
            fragments
                .into_iter()
                .map(|f| Ok(Fragment::content(f)))
                .collect(),
        )
    }

    /// Create a mock from raw stream items (fragments and errors).
    pub fn with_items(items: Vec<Result<Fragment>>) -> Self {
        Self {
            name: "mock".to_string(),
            fragments: std::sync::Mutex::new(items),
            completions: std::sync::Mutex::new(Vec::new()),
            stream_call_error: std::sync::Mutex::new(None),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock whose `stream_complete` call itself fails.
    pub fn failing_stream(error: ClientError) -> Self {
        let mock = Self::with_items(Vec::new());
        *mock.stream_call_error.lock().unwrap() = Some(error);
        mock
    }

    /// Queue a non-streaming response (used for title generation).
    pub fn push_completion(self, response: Result<String>) -> Self {
        self.completions.lock().unwrap().push(response);
        self
    }

    /// All requests made against this client.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.request_log.lock().unwrap().push(request);

        let mut completions = self.completions.lock().unwrap();
        if completions.is_empty() {
            return Err(ClientError::Upstream(
                "MockClient: no more completions available".to_string(),
            ));
        }
        completions.remove(0)
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<FragmentStream> {
        self.request_log.lock().unwrap().push(request);

        if let Some(err) = self.stream_call_error.lock().unwrap().take() {
            return Err(err);
        }

        let items: Vec<Result<Fragment>> = self.fragments.lock().unwrap().drain(..).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use palaver_types::Role;

    #[tokio::test]
    async fn test_mock_stream_yields_fragments_in_order() {
        let client = MockClient::with_fragments(vec!["Hel", "lo", "!"]);

        let request = CompletionRequest::new(
            "test-model",
            vec![PromptMessage::new(Role::User, "Hi")],
            100,
        );
        let mut stream = client.stream_complete(request).await.unwrap();

        let mut collected = String::new();
        while let Some(item) = stream.next().await {
            if let Fragment::Content(text) = item.unwrap() {
                collected.push_str(&text);
            }
        }

        assert_eq!(collected, "Hello!");
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing_stream() {
        let client = MockClient::failing_stream(ClientError::Auth("bad key".to_string()));

        let request = CompletionRequest::new("m", vec![], 10);
        let result = client.stream_complete(request).await;
        assert!(matches!(result, Err(ClientError::Auth(_))));
    }

    #[tokio::test]
    async fn test_mock_mid_stream_error() {
        let client = MockClient::with_items(vec![
            Ok(Fragment::content("partial")),
            Err(ClientError::Upstream("connection reset".to_string())),
        ]);

        let request = CompletionRequest::new("m", vec![], 10);
        let mut stream = client.stream_complete(request).await.unwrap();

        assert!(matches!(
            stream.next().await,
            Some(Ok(Fragment::Content(_)))
        ));
        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::Upstream(_)))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_completion_exhausted() {
        let client = MockClient::with_items(Vec::new());
        let request = CompletionRequest::new("m", vec![], 10);
        assert!(client.complete(request).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_scripted_completion() {
        let client =
            MockClient::with_items(Vec::new()).push_completion(Ok("A short title".to_string()));
        let request = CompletionRequest::new("m", vec![], 10);
        assert_eq!(client.complete(request).await.unwrap(), "A short title");
    }

    #[test]
    fn test_request_from_params() {
        let params = GenerationParams::default();
        let request = CompletionRequest::from_params(
            &params,
            vec![PromptMessage::new(Role::User, "Hi")],
        );
        assert!(request.stream);
        assert_eq!(request.max_tokens, params.output_length);
        assert_eq!(request.temperature, Some(0.6));
        assert_eq!(request.repetition_penalty, Some(1.05));
    }
}
