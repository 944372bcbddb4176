//! OpenAI-compatible completion client.
//!
//! Talks to any service exposing the `/chat/completions` shape,
//! including self-hosted gateways in front of open-weight models.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{
    CompletionClient, CompletionRequest, Fragment, FragmentStream, UsageSignal,
};
use crate::error::{ClientError, Result};
use palaver_types::PromptMessage;

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication (optional for local services).
    pub api_key: Option<String>,

    /// Base URL for the API, up to and including the version segment.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Name for this client instance, used in logs.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a new config for the given gateway.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "openai".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API client.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a shared client.
    pub fn shared(config: OpenAiConfig) -> Result<Arc<dyn CompletionClient>> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    fn to_wire_request(request: &CompletionRequest) -> WireChatRequest {
        WireChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            // Extension field understood by OpenAI-compatible gateways.
            repetition_penalty: request.repetition_penalty,
            stream: request.stream,
            stream_options: request.stream.then_some(WireStreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn handle_error_response(response: Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let detail = serde_json::from_str::<WireErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        match status.as_u16() {
            401 | 403 => ClientError::Auth(format!("Authentication failed: {}", detail)),
            _ => ClientError::Upstream(format!("HTTP {}: {}", status, detail)),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut request = request;
        request.stream = false;

        let wire = Self::to_wire_request(&request);

        tracing::debug!(
            client = %self.config.name,
            model = %wire.model,
            messages = wire.messages.len(),
            "Sending completion request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: WireChatResponse = serde_json::from_str(&body)?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(text)
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<FragmentStream> {
        let mut request = request;
        request.stream = true;

        let wire = Self::to_wire_request(&request);

        tracing::debug!(
            client = %self.config.name,
            model = %wire.model,
            messages = wire.messages.len(),
            "Opening completion stream"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<WireStreamOptions>,
}

#[derive(Debug, serde::Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, serde::Serialize)]
struct WireStreamOptions {
    include_usage: bool,
}

#[derive(Debug, serde::Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, serde::Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, serde::Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, serde::Deserialize)]
struct WireStreamChoice {
    delta: Option<WireStreamDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    done: bool,
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> FragmentStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: String::new(),
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                // Process complete lines in the buffer
                while let Some(line_end) = state.buffer.find('\n') {
                    let line = state.buffer[..line_end].trim().to_string();
                    state.buffer = state.buffer[line_end + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            state.done = true;
                            return None;
                        }

                        if let Ok(chunk) = serde_json::from_str::<WireStreamChunk>(data) {
                            // Terminal usage report arrives in a chunk
                            // with an empty choices array.
                            if let Some(usage) = chunk.usage {
                                return Some((
                                    Ok(Fragment::Usage(UsageSignal {
                                        prompt_tokens: usage.prompt_tokens,
                                        completion_tokens: usage.completion_tokens,
                                    })),
                                    state,
                                ));
                            }

                            if let Some(content) = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta)
                                .and_then(|d| d.content)
                            {
                                return Some((Ok(Fragment::Content(content)), state));
                            }
                        }
                    }
                }

                // Need more data
                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes);
                        state.buffer.push_str(&text);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(ClientError::Network(e.to_string())), state));
                    }
                    None => {
                        return None;
                    }
                }
            }
        },
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_types::Role;

    fn collect_stream(chunks: Vec<&'static str>) -> Vec<Result<Fragment>> {
        let byte_stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        );
        futures::executor::block_on(async {
            let mut stream = parse_sse_stream(byte_stream);
            let mut out = Vec::new();
            while let Some(item) = stream.next().await {
                out.push(item);
            }
            out
        })
    }

    #[test]
    fn test_parse_content_deltas() {
        let items = collect_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Par\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"is\"}}]}\n",
            "data: [DONE]\n",
        ]);

        assert_eq!(items.len(), 2);
        assert!(
            matches!(&items[0], Ok(Fragment::Content(text)) if text == "Par")
        );
        assert!(matches!(&items[1], Ok(Fragment::Content(text)) if text == "is"));
    }

    #[test]
    fn test_parse_split_across_reads() {
        // One SSE line split across two network reads
        let items = collect_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"hello\"}}]}\n\ndata: [DONE]\n",
        ]);

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Ok(Fragment::Content(text)) if text == "hello"));
    }

    #[test]
    fn test_parse_usage_chunk() {
        let items = collect_stream(vec![
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":4}}\n",
            "data: [DONE]\n",
        ]);

        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Ok(Fragment::Usage(UsageSignal {
                prompt_tokens: 9,
                completion_tokens: 4,
            }))
        ));
    }

    #[test]
    fn test_parse_ignores_empty_delta() {
        let items = collect_stream(vec![
            "data: {\"choices\":[{\"delta\":{}}]}\n",
            "data: [DONE]\n",
        ]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_wire_request_shape() {
        let request = CompletionRequest::from_params(
            &palaver_types::GenerationParams::default(),
            vec![PromptMessage::new(Role::User, "Hi")],
        );
        let wire = OpenAiClient::to_wire_request(&request);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        let penalty = json["repetition_penalty"].as_f64().unwrap();
        assert!((penalty - 1.05).abs() < 1e-6);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_non_streaming_request_omits_stream_options() {
        let request = CompletionRequest::new(
            "m",
            vec![PromptMessage::new(Role::User, "Hi")],
            10,
        );
        let wire = OpenAiClient::to_wire_request(&request);
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("stream_options").is_none());
    }

    #[test]
    fn test_config() {
        let config = OpenAiConfig::new("http://localhost:8000/v1", Some("key".to_string()))
            .with_name("local")
            .with_timeout(Duration::from_secs(60));
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.name, "local");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
