//! LLM completion service.
//!
//! The single entry point for sending a conversation to a provider. It
//! assembles the payload from a model config and a chat session, then drives
//! the client synchronously or as a stream. All processing is logged via
//! tracing for observability.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::BoxStream;

use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, StreamChunk};
use crate::registry::Service;
use crate::services::chat::ChatSession;
use crate::services::model::ModelConfig;

/// The LLM service.
pub struct LlmService;

impl LlmService {
    pub fn new() -> Self {
        Self
    }

    /// Builds the completion payload for a model/session pair.
    ///
    /// The model's base model and parameters combine with the session's
    /// system prompt and messages; an empty base model falls back to the
    /// provider default.
    pub fn build_request(model: &ModelConfig, session: &ChatSession) -> CompletionRequest {
        let base_model = if model.base_model.is_empty() {
            model.provider.default_base_model().to_string()
        } else {
            model.base_model.clone()
        };
        CompletionRequest {
            model: base_model,
            system: session.system_prompt.clone(),
            messages: session.messages.clone(),
            parameters: model.parameters.clone(),
        }
    }

    /// Sends a completion and returns the entire response text.
    pub async fn send_completion(
        &self,
        client: &Arc<dyn LlmClient>,
        model: &ModelConfig,
        session: &ChatSession,
    ) -> Result<String> {
        let request = Self::build_request(model, session);
        let start = Instant::now();
        tracing::debug!(
            provider = client.provider_name(),
            model = %request.model,
            message_count = request.messages.len(),
            "Sending completion request"
        );

        let response = client.complete(&request).await?;

        tracing::info!(
            provider = client.provider_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            response_len = response.len(),
            "Completion finished"
        );
        Ok(response)
    }

    /// Starts a streaming completion.
    ///
    /// The returned stream is finite; the final chunk carries `done`.
    pub async fn stream_completion(
        &self,
        client: &Arc<dyn LlmClient>,
        model: &ModelConfig,
        session: &ChatSession,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let request = Self::build_request(model, session);
        tracing::debug!(
            provider = client.provider_name(),
            model = %request.model,
            message_count = request.messages.len(),
            "Starting streaming completion"
        );
        client.complete_stream(&request).await
    }
}

impl Default for LlmService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for LlmService {
    fn name(&self) -> &str {
        "llm"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, Provider};
    use futures::StreamExt;
    use std::collections::HashMap;

    fn fixtures() -> (ModelConfig, ChatSession) {
        let model = ModelConfig::new("test", Provider::Mock, "mock-model", HashMap::new());
        let mut session = ChatSession::new("chat", Some("be terse".to_string()));
        session.messages.push(crate::services::ChatMessage::user("ping"));
        (model, session)
    }

    #[test]
    fn test_build_request_combines_model_and_session() {
        let (model, session) = fixtures();
        let request = LlmService::build_request(&model, &session);

        assert_eq!(request.model, "mock-model");
        assert_eq!(request.system.as_deref(), Some("be terse"));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_build_request_empty_base_model_uses_provider_default() {
        let (mut model, session) = fixtures();
        model.base_model = String::new();
        let request = LlmService::build_request(&model, &session);
        assert_eq!(request.model, Provider::Mock.default_base_model());
    }

    #[tokio::test]
    async fn test_send_completion_via_mock() {
        let (model, session) = fixtures();
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let service = LlmService::new();

        let response = service
            .send_completion(&client, &model, &session)
            .await
            .unwrap();
        assert_eq!(response, "pong");
    }

    #[tokio::test]
    async fn test_stream_completion_via_mock() {
        let (model, session) = fixtures();
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let service = LlmService::new();

        let mut stream = service
            .stream_completion(&client, &model, &session)
            .await
            .unwrap();

        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            full.push_str(&chunk.unwrap().content);
        }
        assert_eq!(full, "pong");
    }
}
