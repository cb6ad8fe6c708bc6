//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns and records how
//! many calls were made, so tests can assert that dry runs never touch the
//! client.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, StreamChunk};
use crate::services::chat::ChatRole;

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Used for unit testing without making real API calls.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Number of completion calls made (sync and streaming).
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the last user message contains `pattern`, the mock returns
    /// `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Returns the number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("hello") || input_lower.contains("hi") {
            return "Hello! How can I help you today?".to_string();
        }

        if input_lower.contains("ping") {
            return "pong".to_string();
        }

        format!("Mock response to: {}", input)
    }

    /// Extracts the last user message content from the request.
    fn extract_user_input(request: &CompletionRequest) -> String {
        request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input = Self::extract_user_input(request);
        Ok(self.mock_response(&input))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input = Self::extract_user_input(request);
        let response = self.mock_response(&input);

        // Simulate streaming by yielding chunks
        let mut chunks: Vec<StreamChunk> = response
            .chars()
            .collect::<Vec<_>>()
            .chunks(10)
            .map(|c| StreamChunk::content(c.iter().collect::<String>()))
            .collect();
        chunks.push(StreamChunk::done());

        let stream = stream::iter(chunks.into_iter().map(Ok));
        Ok(stream.boxed())
    }
}
