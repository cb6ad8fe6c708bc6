//! Built-in services and their typed global accessors.

pub mod chat;
pub mod error_state;
pub mod model;
pub mod stack;
pub mod variable;

use std::sync::Arc;

use crate::error::Result;
use crate::registry::get_typed_service;

pub use chat::{ChatMessage, ChatRole, ChatSession, ChatSessionService};
pub use error_state::ErrorStateService;
pub use model::{ModelConfig, ModelService};
pub use stack::{Boundary, StackService, DEFAULT_MAX_STACK_DEPTH};
pub use variable::{VariableService, USER_WRITABLE_SYSTEM};

/// Returns the global variable service.
pub fn variable_service() -> Result<Arc<VariableService>> {
    get_typed_service("variable")
}

/// Returns the global stack service.
pub fn stack_service() -> Result<Arc<StackService>> {
    get_typed_service("stack")
}

/// Returns the global error-state service.
pub fn error_state_service() -> Result<Arc<ErrorStateService>> {
    get_typed_service("error-state")
}

/// Returns the global chat session service.
pub fn chat_service() -> Result<Arc<ChatSessionService>> {
    get_typed_service("chat")
}

/// Returns the global model service.
pub fn model_service() -> Result<Arc<ModelService>> {
    get_typed_service("model")
}

/// Returns the global LLM client factory.
pub fn client_factory_service() -> Result<Arc<crate::llm::ClientFactoryService>> {
    get_typed_service("client-factory")
}

/// Returns the global LLM service.
pub fn llm_service() -> Result<Arc<crate::llm::LlmService>> {
    get_typed_service("llm")
}

/// Returns the global configuration service.
pub fn config_service() -> Result<Arc<crate::config::ConfigService>> {
    get_typed_service("config")
}
