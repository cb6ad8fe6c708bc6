//! LLM integration.
//!
//! Provides the client trait and implementations for communicating with LLM
//! providers, the fingerprinted client factory, and the completion service
//! that assembles payloads from model configs and chat sessions.

pub mod anthropic;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod service;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use factory::{fingerprint, ClientFactoryService, ClientHandle};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use service::LlmService;

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::services::chat::ChatMessage;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI (GPT-4o, etc.)
    #[default]
    OpenAi,
    /// Anthropic (Claude)
    Anthropic,
    /// Mock client for testing (no API key required)
    Mock,
}

impl Provider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }

    /// The environment variable consulted for this provider's API key.
    pub fn env_key_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Mock => None,
        }
    }

    /// The base model used when a model config does not name one.
    pub fn default_base_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Mock => "mock-model",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-assembled completion payload.
///
/// Built by the LLM service from a model config and a chat session; clients
/// translate it into their provider's wire format.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Provider-side model identifier.
    pub model: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Conversation messages in order.
    pub messages: Vec<ChatMessage>,
    /// Model parameters (temperature, max_tokens, ...).
    pub parameters: HashMap<String, serde_json::Value>,
}

impl CompletionRequest {
    /// Reads the `temperature` parameter, if numeric.
    pub fn temperature(&self) -> Option<f64> {
        self.parameters.get("temperature").and_then(|v| v.as_f64())
    }

    /// Reads the `max_tokens` parameter, if numeric.
    pub fn max_tokens(&self) -> Option<u32> {
        self.parameters
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }
}

/// One unit of a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text produced since the previous chunk. May be empty on the final one.
    pub content: String,
    /// True on the last chunk of the stream.
    pub done: bool,
}

impl StreamChunk {
    /// A content-bearing chunk.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }
}

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async
/// operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// The provider this client talks to.
    fn provider_name(&self) -> &'static str;

    /// True when the client holds everything it needs to make calls.
    fn is_configured(&self) -> bool;

    /// Generates a completion, returning the complete response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Generates a streaming completion.
    ///
    /// The stream is finite and non-restartable; the final chunk has `done`
    /// set. Consumed to completion by a single reader on the engine thread.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(
            "anthropic".parse::<Provider>().unwrap(),
            Provider::Anthropic
        );
        assert_eq!("mock".parse::<Provider>().unwrap(), Provider::Mock);
        assert!("unknown".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_env_key_vars() {
        assert_eq!(Provider::OpenAi.env_key_var(), Some("OPENAI_API_KEY"));
        assert_eq!(Provider::Anthropic.env_key_var(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(Provider::Mock.env_key_var(), None);
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(format!("{}", Provider::Anthropic), "anthropic");
    }

    #[test]
    fn test_request_parameter_accessors() {
        let mut parameters = HashMap::new();
        parameters.insert("temperature".to_string(), serde_json::json!(0.2));
        parameters.insert("max_tokens".to_string(), serde_json::json!(512));
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            system: None,
            messages: Vec::new(),
            parameters,
        };
        assert_eq!(request.temperature(), Some(0.2));
        assert_eq!(request.max_tokens(), Some(512));
    }

    #[test]
    fn test_stream_chunk_constructors() {
        let chunk = StreamChunk::content("hi");
        assert_eq!(chunk.content, "hi");
        assert!(!chunk.done);

        let done = StreamChunk::done();
        assert!(done.content.is_empty());
        assert!(done.done);
    }
}
