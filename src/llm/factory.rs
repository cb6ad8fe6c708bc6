//! LLM client factory.
//!
//! Centralizes provider-specific client construction behind a cache keyed on
//! `(provider, key fingerprint)`. Identical requests return the same handle,
//! so a client ID stored in `_client_id` stays valid for the process
//! lifetime. Cache entries are reference-shared and immutable after creation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{NeuroError, Result};
use crate::llm::{
    AnthropicClient, AnthropicConfig, LlmClient, MockLlmClient, OpenAiClient, OpenAiConfig,
    Provider,
};
use crate::registry::Service;

/// Fingerprints an API key for display and cache keying.
///
/// Keeps only the first 8 characters followed by `****`; shorter keys render
/// as `****` alone. The full key never leaves the factory.
pub fn fingerprint(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    if prefix.len() < 8 {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

/// A cached client handle.
#[derive(Clone)]
pub struct ClientHandle {
    /// Cache ID, `<provider>:<fingerprint>`. This is what `_client_id` holds.
    pub id: String,
    /// Provider the client talks to.
    pub provider: Provider,
    /// Displayable key fingerprint.
    pub fingerprint: String,
    /// The shared client.
    pub client: Arc<dyn LlmClient>,
}

/// The client factory service.
pub struct ClientFactoryService {
    cache: RwLock<HashMap<String, ClientHandle>>,
}

impl ClientFactoryService {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Obtains or creates a client for the provider.
    ///
    /// Key fallback order: the explicit `key` argument, then the provider's
    /// environment variable (resolved through the variable service so `.env`
    /// overrides participate). Returns the handle and whether it was created
    /// by this call.
    pub fn get_or_create(
        &self,
        provider: Provider,
        key: Option<String>,
    ) -> Result<(ClientHandle, bool)> {
        let key = match key.filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => self.key_from_env(provider)?,
        };

        let id = format!("{}:{}", provider.as_str(), fingerprint(&key));

        if let Some(handle) = self.cache.read().get(&id) {
            return Ok((handle.clone(), false));
        }

        let client: Arc<dyn LlmClient> = match provider {
            Provider::OpenAi => Arc::new(OpenAiClient::new(OpenAiConfig::new(key.clone()))?),
            Provider::Anthropic => {
                Arc::new(AnthropicClient::new(AnthropicConfig::new(key.clone()))?)
            }
            Provider::Mock => Arc::new(MockLlmClient::new()),
        };

        let handle = ClientHandle {
            id: id.clone(),
            provider,
            fingerprint: fingerprint(&key),
            client,
        };
        self.cache.write().insert(id, handle.clone());
        Ok((handle, true))
    }

    /// Looks up a cached handle by ID.
    pub fn get(&self, id: &str) -> Option<ClientHandle> {
        self.cache.read().get(id).cloned()
    }

    /// Returns the number of cached clients.
    pub fn client_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Installs a pre-built client under the given ID. Test hook.
    pub fn insert_client(&self, id: &str, provider: Provider, client: Arc<dyn LlmClient>) {
        let handle = ClientHandle {
            id: id.to_string(),
            provider,
            fingerprint: "****".to_string(),
            client,
        };
        self.cache.write().insert(id.to_string(), handle);
    }

    fn key_from_env(&self, provider: Provider) -> Result<String> {
        let Some(var) = provider.env_key_var() else {
            // Mock needs no key; the fingerprint still wants some text.
            return Ok("mock-key".to_string());
        };
        let env = crate::services::variable_service()
            .ok()
            .and_then(|vars| vars.get_env(var))
            .or_else(|| std::env::var(var).ok());
        env.filter(|k| !k.is_empty()).ok_or_else(|| {
            NeuroError::llm(format!(
                "No API key configured for provider '{}'. Pass key= or set {}.",
                provider, var
            ))
        })
    }
}

impl Default for ClientFactoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ClientFactoryService {
    fn name(&self) -> &str {
        "client-factory"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
