//! Anthropic LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's Messages API.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NeuroError, Result};
use crate::llm::{CompletionRequest, LlmClient, StreamChunk};
use crate::services::chat::{ChatMessage, ChatRole};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate when the model config does not say.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuroError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Converts conversation messages to Anthropic format.
    ///
    /// System-role messages inside the conversation fold into the separate
    /// system parameter alongside the session's system prompt.
    fn convert_messages(
        system: Option<&str>,
        messages: &[ChatMessage],
    ) -> (Option<String>, Vec<WireMessage>) {
        let mut system_parts: Vec<String> = system.map(|s| vec![s.to_string()]).unwrap_or_default();
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                ChatRole::System => system_parts.push(msg.content.clone()),
                ChatRole::User => converted.push(WireMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
                ChatRole::Assistant => converted.push(WireMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, converted)
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> MessagesRequest {
        let (system, messages) = Self::convert_messages(request.system.as_deref(), &request.messages);
        MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature(),
            system,
            messages,
            stream,
        }
    }

    /// Posts one Messages API request, mapping transport failures.
    async fn post(&self, wire: &MessagesRequest) -> Result<reqwest::Response> {
        self.client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NeuroError::llm(format!(
                        "Anthropic request timed out after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    NeuroError::llm(format!("could not reach the Anthropic API: {}", e))
                }
            })
    }

    /// Maps a non-success HTTP response to an error.
    fn api_error(status: StatusCode, body: &str) -> NeuroError {
        let detail = error_detail(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NeuroError::llm(format!(
                "Anthropic rejected the API key (HTTP {})",
                status.as_u16()
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                NeuroError::llm("Anthropic rate limit hit; wait before retrying")
            }
            _ => NeuroError::llm(format!(
                "Anthropic returned HTTP {}: {}",
                status.as_u16(),
                detail.unwrap_or_else(|| truncated(body))
            )),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let wire = self.build_request(request, false);
        let response = self.post(&wire).await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NeuroError::llm(format!("could not read Anthropic response: {}", e)))?;
        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| NeuroError::llm(format!("unexpected Anthropic response shape: {}", e)))?;

        let text = parsed.joined_text();
        if text.is_empty() {
            return Err(NeuroError::llm("Anthropic returned an empty completion"));
        }
        Ok(text)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let wire = self.build_request(request, true);
        let response = self.post(&wire).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(status, &body));
        }

        // Each network chunk may carry several SSE events; decode them all
        // and flatten into per-delta stream chunks.
        let chunks = response.bytes_stream().flat_map(|network| {
            let items: Vec<Result<StreamChunk>> = match network {
                Ok(bytes) => decode_sse_payload(&String::from_utf8_lossy(&bytes)),
                Err(e) => vec![Err(NeuroError::llm(format!(
                    "Anthropic stream interrupted: {}",
                    e
                )))],
            };
            stream::iter(items)
        });

        Ok(chunks.boxed())
    }
}

/// Decodes one network chunk of the SSE stream into stream chunks.
///
/// Text deltas become content chunks in arrival order; `message_stop` yields
/// the terminal chunk. Events this client does not consume (message_start,
/// ping, content_block_start, ...) decode but produce nothing.
fn decode_sse_payload(payload: &str) -> Vec<Result<StreamChunk>> {
    let mut out = Vec::new();

    for line in payload.lines() {
        let Some(data) = line.trim().strip_prefix("data: ") else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
            continue;
        };
        match event.kind.as_str() {
            "content_block_delta" => {
                let text = event.delta.and_then(|d| d.text).unwrap_or_default();
                if !text.is_empty() {
                    out.push(Ok(StreamChunk::content(text)));
                }
            }
            "message_stop" => out.push(Ok(StreamChunk::done())),
            _ => {}
        }
    }

    out
}

/// Pulls the `error.message` field out of an API error body, if present.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|e| e.error.message)
}

/// Keeps error output readable when the body is large or not JSON.
fn truncated(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

// Messages API wire format

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenates the text blocks, skipping tool-use and thinking blocks.
    fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
