//! Built-in commands and their registration.
//!
//! Rust has no module-init side effects, so every builtin registers here,
//! called once from `shell::bootstrap` (and from tests through the same
//! hook).

pub mod bash;
pub mod control;
pub mod echo;
pub mod llm;
pub mod model;
pub mod session;
pub mod system;
pub mod variables;

use std::sync::Arc;

use crate::error::Result;
use crate::registry::CommandRegistry;

/// Registers every builtin command into the given registry.
pub fn register_builtins(registry: &CommandRegistry) -> Result<()> {
    // Variables
    registry.register(Arc::new(variables::SetCommand))?;
    registry.register(Arc::new(variables::GetCommand))?;
    registry.register(Arc::new(variables::GetEnvCommand))?;
    registry.register(Arc::new(variables::VarsCommand))?;

    // Output and subprocesses
    registry.register(Arc::new(echo::EchoCommand))?;
    registry.register(Arc::new(bash::BashCommand))?;

    // Control flow
    registry.register(Arc::new(control::TryCommand))?;
    registry.register(Arc::new(control::SilentCommand))?;
    registry.register(Arc::new(control::IfCommand))?;
    registry.register(Arc::new(control::IfNotCommand))?;
    registry.register(Arc::new(control::WhileCommand))?;

    // Sessions
    registry.register(Arc::new(session::SessionNewCommand))?;
    registry.register(Arc::new(session::SessionActivateCommand))?;
    registry.register(Arc::new(session::SessionDeleteCommand))?;
    registry.register(Arc::new(session::SessionListCommand))?;
    registry.register(Arc::new(session::SessionAddUserMsgCommand))?;
    registry.register(Arc::new(session::SessionAddAssistantMsgCommand))?;
    registry.register(Arc::new(session::SessionMessageCountCommand))?;

    // Models
    registry.register(Arc::new(model::ModelNewCommand))?;
    registry.register(Arc::new(model::ModelActivateCommand))?;
    registry.register(Arc::new(model::ModelDeleteCommand))?;
    registry.register(Arc::new(model::ModelListCommand))?;

    // LLM orchestration
    registry.register(Arc::new(llm::LlmClientGetCommand))?;
    registry.register(Arc::new(llm::LlmCallCommand))?;
    registry.register(Arc::new(llm::SendCommand))?;
    registry.register(Arc::new(llm::SendDelegateCommand))?;

    // System
    registry.register(Arc::new(system::HelpCommand))?;
    registry.register(Arc::new(system::QuitCommand::quit()))?;
    registry.register(Arc::new(system::QuitCommand::exit()))?;

    Ok(())
}
