//! OpenAI LLM client implementation.
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API.
//! Transient failures (rate limits, 5xx, network hiccups) are retried on a
//! short fixed schedule; everything else fails fast.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NeuroError, Result};
use crate::llm::{CompletionRequest, LlmClient, StreamChunk};
use crate::services::chat::ChatMessage;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI API base URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Waits between retries of a transient failure. Length bounds the retries.
const RETRY_DELAYS_MS: [u64; 2] = [500, 2000];

/// One round trip's outcome classification.
enum CallFailure {
    /// Worth another attempt (rate limit, 5xx, network hiccup).
    Transient(NeuroError),
    /// Retrying cannot help (bad key, malformed request, parse failure).
    Fatal(NeuroError),
}

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
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

/// OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuroError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Converts conversation messages to OpenAI API format.
    ///
    /// The session's system prompt, if any, leads the message list.
    fn convert_messages(system: Option<&str>, messages: &[ChatMessage]) -> Vec<WireMessage> {
        let mut converted = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            converted.push(WireMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        converted.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));
        converted
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(request.system.as_deref(), &request.messages),
            temperature: request.temperature(),
            max_tokens: request.max_tokens(),
            stream,
        }
    }

    /// Posts one Chat Completions request, classifying transport failures.
    async fn post(&self, wire: &ChatRequest) -> std::result::Result<reqwest::Response, CallFailure> {
        self.client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", "application/json")
            .json(wire)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!(
                        "OpenAI request timed out after {}s",
                        self.config.timeout_secs
                    )
                } else {
                    format!("could not reach the OpenAI API: {}", e)
                };
                if e.is_timeout() || e.is_connect() {
                    CallFailure::Transient(NeuroError::llm(message))
                } else {
                    CallFailure::Fatal(NeuroError::llm(message))
                }
            })
    }

    /// One complete round trip: send, classify the status, extract the text.
    async fn complete_once(&self, wire: &ChatRequest) -> std::result::Result<String, CallFailure> {
        let response = self.post(wire).await?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CallFailure::Transient(NeuroError::llm(format!(
                "could not read OpenAI response: {}",
                e
            )))
        })?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            CallFailure::Fatal(NeuroError::llm(format!(
                "unexpected OpenAI response shape: {}",
                e
            )))
        })?;
        parsed
            .first_content()
            .ok_or_else(|| CallFailure::Fatal(NeuroError::llm("OpenAI returned no choices")))
    }

    /// Buckets a non-success HTTP status into transient or fatal.
    fn classify_status(status: StatusCode, body: &str) -> CallFailure {
        let detail = error_detail(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CallFailure::Fatal(NeuroError::llm(format!(
                    "OpenAI rejected the API key (HTTP {})",
                    status.as_u16()
                )))
            }
            StatusCode::TOO_MANY_REQUESTS => CallFailure::Transient(NeuroError::llm(
                "OpenAI rate limit hit; backing off",
            )),
            s if s.is_server_error() => CallFailure::Transient(NeuroError::llm(format!(
                "OpenAI server error (HTTP {})",
                status.as_u16()
            ))),
            _ => CallFailure::Fatal(NeuroError::llm(format!(
                "OpenAI returned HTTP {}: {}",
                status.as_u16(),
                detail.unwrap_or_else(|| body.to_string())
            ))),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let wire = self.build_request(request, false);

        let mut last_failure: Option<NeuroError> = None;
        for attempt in 0..=RETRY_DELAYS_MS.len() {
            if attempt > 0 {
                let wait = Duration::from_millis(RETRY_DELAYS_MS[attempt - 1]);
                tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, "Retrying OpenAI request");
                tokio::time::sleep(wait).await;
            }

            match self.complete_once(&wire).await {
                Ok(text) => return Ok(text),
                Err(CallFailure::Fatal(e)) => return Err(e),
                Err(CallFailure::Transient(e)) => last_failure = Some(e),
            }
        }

        Err(last_failure
            .unwrap_or_else(|| NeuroError::llm("OpenAI request failed with no attempts made")))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        // Streams are not retried: a broken stream mid-response cannot be
        // resumed, so the first failure surfaces directly.
        let wire = self.build_request(request, true);
        let response = self.post(&wire).await.map_err(|f| match f {
            CallFailure::Transient(e) | CallFailure::Fatal(e) => e,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match Self::classify_status(status, &body) {
                CallFailure::Transient(e) | CallFailure::Fatal(e) => e,
            });
        }

        let chunks = response.bytes_stream().flat_map(|network| {
            let items: Vec<Result<StreamChunk>> = match network {
                Ok(bytes) => decode_sse_payload(&String::from_utf8_lossy(&bytes)),
                Err(e) => vec![Err(NeuroError::llm(format!(
                    "OpenAI stream interrupted: {}",
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
/// Delta content becomes content chunks in arrival order; the `[DONE]`
/// marker yields the terminal chunk.
fn decode_sse_payload(payload: &str) -> Vec<Result<StreamChunk>> {
    let mut out = Vec::new();

    for line in payload.lines() {
        let Some(data) = line.trim().strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            out.push(Ok(StreamChunk::done()));
            continue;
        }
        let Ok(event) = serde_json::from_str::<StreamPayload>(data) else {
            continue;
        };
        for choice in event.choices {
            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    out.push(Ok(StreamChunk::content(text)));
                }
            }
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

// Chat Completions wire format

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl ChatResponse {
    /// The first choice's message content, if the API returned any.
    fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    choices: Vec<DeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
