//! The command registry.
//!
//! Holds the name → command mapping consulted by the engine for every frame.
//! Commands are registered once at bootstrap; after that the registry is
//! read-only in practice, but the map stays guarded so tests can swap the
//! global instance safely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::engine::parser::ParseMode;
use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};

/// A shell command.
///
/// Commands are stateless; all state lives in services reached through the
/// global service registry. `execute` receives the parsed options and input
/// (plus the raw frame text) in the execution context.
#[async_trait]
pub trait Command: Send + Sync {
    /// The command name, as typed after the leading backslash.
    fn name(&self) -> &str;

    /// How the text after the command name is split into options and input.
    fn parse_mode(&self) -> ParseMode {
        ParseMode::KeyValue
    }

    /// Short description shown in help listings.
    fn description(&self) -> &str;

    /// Usage line, e.g. `\set[name=value]`.
    fn usage(&self) -> &str;

    /// Detailed help text. Defaults to description plus usage.
    fn help_info(&self) -> String {
        format!("{}\n\nUsage: {}", self.description(), self.usage())
    }

    /// Read-only commands do not disturb `_status`/`_error` on entry or on
    /// success, so error state survives for post-failure inspection.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Executes the command against the current context.
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()>;
}

/// Name → command mapping.
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a command.
    ///
    /// Rejects empty names and duplicates; once registered, a command's
    /// identity is immutable for the life of the registry.
    pub fn register(&self, cmd: Arc<dyn Command>) -> Result<()> {
        let name = cmd.name().to_string();
        if name.is_empty() {
            return Err(NeuroError::DuplicateCommand(
                "command name cannot be empty".to_string(),
            ));
        }
        let mut commands = self.commands.write();
        if commands.contains_key(&name) {
            return Err(NeuroError::DuplicateCommand(name));
        }
        commands.insert(name, cmd);
        Ok(())
    }

    /// Looks up a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().get(name).cloned()
    }

    /// Returns all registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    /// Returns true if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_COMMANDS: RwLock<Arc<CommandRegistry>> =
        RwLock::new(Arc::new(CommandRegistry::new()));
}

/// Returns the global command registry.
pub fn global_command_registry() -> Arc<CommandRegistry> {
    GLOBAL_COMMANDS.read().clone()
}

/// Swaps the global command registry, returning the previous one.
///
/// Used by tests to isolate registration state.
pub fn set_global_command_registry(registry: Arc<CommandRegistry>) -> Arc<CommandRegistry> {
    std::mem::replace(&mut *GLOBAL_COMMANDS.write(), registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCommand {
        name: &'static str,
    }

    #[async_trait]
    impl Command for NoopCommand {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        fn usage(&self) -> &str {
            "\\noop"
        }

        async fn execute(&self, _ctx: &mut ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(NoopCommand { name: "noop" }))
            .unwrap();

        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(NoopCommand { name: "noop" }))
            .unwrap();

        let err = registry
            .register(Arc::new(NoopCommand { name: "noop" }))
            .unwrap_err();
        assert!(matches!(err, NeuroError::DuplicateCommand(_)));
    }

    #[test]
    fn test_register_empty_name_fails() {
        let registry = CommandRegistry::new();
        let err = registry
            .register(Arc::new(NoopCommand { name: "" }))
            .unwrap_err();
        assert!(matches!(err, NeuroError::DuplicateCommand(_)));
    }

    #[test]
    fn test_names_sorted() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(NoopCommand { name: "zeta" }))
            .unwrap();
        registry
            .register(Arc::new(NoopCommand { name: "alpha" }))
            .unwrap();

        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_default_parse_mode_is_key_value() {
        let cmd = NoopCommand { name: "noop" };
        assert_eq!(cmd.parse_mode(), ParseMode::KeyValue);
        assert!(!cmd.is_read_only());
    }
}
