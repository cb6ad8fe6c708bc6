//! System commands: help, quit/exit.

use async_trait::async_trait;

use crate::engine::parser::ParseMode;
use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};
use crate::registry::{global_command_registry, Command};

/// `\help [name]` / `\help[keywords=[...]]` — registry-driven help.
pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::WithOptions
    }

    fn description(&self) -> &str {
        "Show available commands or detailed help for one command"
    }

    fn usage(&self) -> &str {
        "\\help [command] or \\help[keywords=[word1,word2]]"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let registry = global_command_registry();

        let wanted = ctx.input.trim().trim_start_matches('\\');
        if !wanted.is_empty() {
            let command = registry.get(wanted).ok_or_else(|| {
                NeuroError::execution(format!("Unknown command: \\{}", wanted))
            })?;
            ctx.println(format!("\\{}", command.name()));
            ctx.println(command.help_info());
            return Ok(());
        }

        let keywords: Vec<String> = ctx
            .options
            .get("keywords")
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().trim_start_matches('\\').to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        for name in registry.names() {
            let Some(command) = registry.get(&name) else {
                continue;
            };
            let description = command.description().to_string();
            if !keywords.is_empty() {
                let haystack = format!("{} {}", name, description).to_lowercase();
                if !keywords.iter().any(|k| haystack.contains(k)) {
                    continue;
                }
            }
            ctx.println(format!("\\{:<26} {}", name, description));
        }
        Ok(())
    }
}

/// `\quit` / `\exit` — cooperative shutdown.
///
/// Returns the exit sentinel; the REPL and script hosts recognize it and
/// stop cleanly.
pub struct QuitCommand {
    name: &'static str,
}

impl QuitCommand {
    pub fn quit() -> Self {
        Self { name: "quit" }
    }

    pub fn exit() -> Self {
        Self { name: "exit" }
    }
}

#[async_trait]
impl Command for QuitCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Exit the shell"
    }

    fn usage(&self) -> &str {
        "\\quit"
    }

    async fn execute(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(NeuroError::Exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_quit_returns_exit_sentinel() {
        let mut ctx =
            ExecutionContext::new(HashMap::new(), String::new(), String::new(), false);
        let err = QuitCommand::quit().execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, NeuroError::Exit));
    }

    #[test]
    fn test_quit_and_exit_names() {
        assert_eq!(QuitCommand::quit().name(), "quit");
        assert_eq!(QuitCommand::exit().name(), "exit");
    }

    #[test]
    fn test_help_is_read_only_with_options() {
        assert!(HelpCommand.is_read_only());
        assert_eq!(HelpCommand.parse_mode(), ParseMode::WithOptions);
    }
}
