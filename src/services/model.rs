//! Model configurations.
//!
//! Named `(provider, base model, parameters)` bundles. Models form an
//! indexed set with at most one active; the active model is the default for
//! `llm-call`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NeuroError, Result};
use crate::llm::Provider;
use crate::registry::Service;

/// A named model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unique model ID.
    pub id: String,
    /// User-chosen model name.
    pub name: String,
    /// Provider this model belongs to.
    pub provider: Provider,
    /// Provider-side model identifier, e.g. `gpt-4o`.
    pub base_model: String,
    /// Call parameters (temperature, max_tokens, ...).
    pub parameters: HashMap<String, serde_json::Value>,
}

impl ModelConfig {
    /// Creates a model config with a fresh ID.
    pub fn new(
        name: impl Into<String>,
        provider: Provider,
        base_model: impl Into<String>,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            provider,
            base_model: base_model.into(),
            parameters,
        }
    }

    /// Reads the `temperature` parameter, if set and numeric.
    pub fn temperature(&self) -> Option<f64> {
        self.parameters.get("temperature").and_then(|v| v.as_f64())
    }

    /// Reads the `max_tokens` parameter, if set and numeric.
    pub fn max_tokens(&self) -> Option<u32> {
        self.parameters
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }
}

/// The model service.
pub struct ModelService {
    models: RwLock<HashMap<String, ModelConfig>>,
    active_id: RwLock<Option<String>>,
}

impl ModelService {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            active_id: RwLock::new(None),
        }
    }

    /// Creates a model and makes it active. Model names are unique.
    pub fn create_model(
        &self,
        name: &str,
        provider: Provider,
        base_model: &str,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Result<ModelConfig> {
        if name.is_empty() {
            return Err(NeuroError::usage(
                "\\model-new[name=<name>, provider=<provider>]",
            ));
        }
        let mut models = self.models.write();
        if models.values().any(|m| m.name == name) {
            return Err(NeuroError::execution(format!(
                "model '{}' already exists",
                name
            )));
        }
        let model = ModelConfig::new(name, provider, base_model, parameters);
        models.insert(model.id.clone(), model.clone());
        *self.active_id.write() = Some(model.id.clone());
        Ok(model)
    }

    /// Activates a model by name or ID, returning its ID.
    pub fn activate(&self, name_or_id: &str) -> Result<String> {
        let id = self
            .resolve(name_or_id)
            .ok_or_else(|| NeuroError::execution(format!("no model '{}'", name_or_id)))?;
        *self.active_id.write() = Some(id.clone());
        Ok(id)
    }

    /// Deletes a model by name or ID, clearing the active slot if needed.
    pub fn delete(&self, name_or_id: &str) -> Result<()> {
        let id = self
            .resolve(name_or_id)
            .ok_or_else(|| NeuroError::execution(format!("no model '{}'", name_or_id)))?;
        self.models.write().remove(&id);
        let mut active = self.active_id.write();
        if active.as_deref() == Some(id.as_str()) {
            *active = None;
        }
        Ok(())
    }

    /// Returns a copy of the active model, if any.
    pub fn active_model(&self) -> Option<ModelConfig> {
        let active = self.active_id.read();
        let id = active.as_deref()?;
        self.models.read().get(id).cloned()
    }

    /// Finds a model by name or ID.
    pub fn find(&self, name_or_id: &str) -> Option<ModelConfig> {
        let id = self.resolve(name_or_id)?;
        self.models.read().get(&id).cloned()
    }

    /// Lists models ordered by name.
    pub fn list(&self) -> Vec<ModelConfig> {
        let mut models: Vec<ModelConfig> = self.models.read().values().cloned().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Returns the active model ID, if any.
    pub fn active_id(&self) -> Option<String> {
        self.active_id.read().clone()
    }

    fn resolve(&self, name_or_id: &str) -> Option<String> {
        let models = self.models.read();
        if models.contains_key(name_or_id) {
            return Some(name_or_id.to_string());
        }
        models
            .values()
            .find(|m| m.name == name_or_id)
            .map(|m| m.id.clone())
    }
}

impl Default for ModelService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ModelService {
    fn name(&self) -> &str {
        "model"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
