//! Shell bootstrap, REPL, and startup script.
//!
//! `bootstrap` builds a fresh registry pair, registers every builtin command
//! and service, swaps them into the globals, and runs two-phase service
//! initialization. Tests call the same hook to get isolated state.

use std::io::Write;
use std::sync::Arc;

use crate::commands;
use crate::config::{self, ConfigService};
use crate::engine::Engine;
use crate::error::{NeuroError, Result};
use crate::llm::{ClientFactoryService, LlmService};
use crate::registry::{
    set_global_command_registry, set_global_service_registry, CommandRegistry, ServiceRegistry,
};
use crate::script;
use crate::services::{
    ChatSessionService, ErrorStateService, ModelService, StackService, VariableService,
};

/// Builds and installs fresh global registries, then initializes services.
///
/// Registration order matters: the variable service goes first so every
/// later `initialize` can publish system variables through it.
pub fn bootstrap() -> Result<()> {
    let commands_registry = Arc::new(CommandRegistry::new());
    commands::register_builtins(&commands_registry)?;
    set_global_command_registry(commands_registry);

    let services_registry = Arc::new(ServiceRegistry::new());
    services_registry.register_service(Arc::new(VariableService::new()))?;
    services_registry.register_service(Arc::new(ErrorStateService::new()))?;
    services_registry.register_service(Arc::new(StackService::new()))?;
    services_registry.register_service(Arc::new(ChatSessionService::new()))?;
    services_registry.register_service(Arc::new(ModelService::new()))?;
    services_registry.register_service(Arc::new(ClientFactoryService::new()))?;
    services_registry.register_service(Arc::new(LlmService::new()))?;
    services_registry.register_service(Arc::new(ConfigService::new()))?;

    // Swap before initializing: services reach each other through the
    // global accessors during initialize.
    set_global_service_registry(services_registry.clone());
    services_registry.initialize_all()?;
    Ok(())
}

/// Executes `~/.neurorc` if present, recording the outcome in
/// `#neurorc_executed`.
pub async fn run_neurorc(engine: &Engine) {
    let Some(path) = config::neurorc_path() else {
        return;
    };

    let executed = match script::run_script(engine, &path).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "neurorc failed");
            eprintln!("Warning: ~/.neurorc failed: {}", e);
            false
        }
    };

    if let Ok(vars) = crate::services::variable_service() {
        let _ = vars.set_system_variable(
            "#neurorc_executed",
            if executed { "true" } else { "false" },
        );
    }
}

/// Runs the interactive read-eval-print loop.
///
/// Errors are reported and the loop continues; the exit sentinel (or EOF)
/// ends it cleanly.
pub async fn repl(engine: &Engine) -> Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("neuro> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                return Err(NeuroError::execution(format!("stdin error: {}", e)));
            }
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        match engine.execute(line).await {
            Ok(()) => {}
            Err(NeuroError::Exit) => break,
            Err(e) => eprintln!("{}: {}", e.category(), e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{global_command_registry, global_service_registry};

    #[test]
    fn test_bootstrap_installs_registries() {
        let _guard = crate::test_util::global_guard();
        bootstrap().unwrap();

        let commands = global_command_registry();
        assert!(commands.get("set").is_some());
        assert!(commands.get("llm-call").is_some());

        let services = global_service_registry();
        assert!(services.get_service("variable").is_ok());
        assert!(services.get_service("llm").is_ok());
        // Variable service initializes first.
        assert_eq!(services.names().first().map(String::as_str), Some("variable"));
    }

    #[test]
    fn test_bootstrap_twice_gives_fresh_state() {
        let _guard = crate::test_util::global_guard();
        bootstrap().unwrap();
        crate::services::variable_service()
            .unwrap()
            .set("leftover", "1")
            .unwrap();

        bootstrap().unwrap();
        assert!(crate::services::variable_service()
            .unwrap()
            .get("leftover")
            .is_err());
    }
}
