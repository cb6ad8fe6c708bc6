//! Session commands: session-new, session-activate, session-delete,
//! session-list, session-add-usermsg, session-add-assistantmsg,
//! session-messagecount.

use async_trait::async_trait;

use crate::engine::parser::ParseMode;
use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};
use crate::registry::Command;
use crate::services;

/// Resolves a session name from `name=` or the input text.
fn session_arg(ctx: &ExecutionContext, usage: &str) -> Result<String> {
    ctx.options
        .get("name")
        .filter(|n| !n.is_empty())
        .cloned()
        .or_else(|| {
            let input = ctx.input.trim();
            (!input.is_empty()).then(|| input.to_string())
        })
        .ok_or_else(|| NeuroError::usage(usage))
}

/// `\session-new[name=..., system=...]` — create and activate a session.
pub struct SessionNewCommand;

#[async_trait]
impl Command for SessionNewCommand {
    fn name(&self) -> &str {
        "session-new"
    }

    fn description(&self) -> &str {
        "Create a chat session and make it active"
    }

    fn usage(&self) -> &str {
        "\\session-new[name=<name>, system=<prompt>]"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = session_arg(ctx, self.usage())?;
        let system = ctx
            .options
            .get("system")
            .filter(|s| !s.is_empty())
            .cloned();

        let chat = services::chat_service()?;
        let session = chat.create_session(&name, system)?;

        let vars = services::variable_service()?;
        vars.set_system_variable("#session_id", &session.id)?;
        vars.set_system_variable("#session_name", &session.name)?;
        vars.set_system_variable("#message_count", "0")?;

        ctx.println(format!("Created session '{}' ({})", session.name, session.id));
        Ok(())
    }
}

/// `\session-activate <name>` — switch the active session.
pub struct SessionActivateCommand;

#[async_trait]
impl Command for SessionActivateCommand {
    fn name(&self) -> &str {
        "session-activate"
    }

    fn description(&self) -> &str {
        "Make a session the active one"
    }

    fn usage(&self) -> &str {
        "\\session-activate <name or id>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = session_arg(ctx, self.usage())?;
        let chat = services::chat_service()?;
        let id = chat.activate(&name)?;

        let session = chat
            .active_session()
            .ok_or_else(|| NeuroError::execution("no active session"))?;
        let vars = services::variable_service()?;
        vars.set_system_variable("#session_id", &id)?;
        vars.set_system_variable("#session_name", &session.name)?;
        vars.set_system_variable("#message_count", &session.message_count().to_string())?;

        ctx.println(format!("Activated session '{}'", session.name));
        Ok(())
    }
}

/// `\session-delete <name>` — delete a session.
pub struct SessionDeleteCommand;

#[async_trait]
impl Command for SessionDeleteCommand {
    fn name(&self) -> &str {
        "session-delete"
    }

    fn description(&self) -> &str {
        "Delete a chat session"
    }

    fn usage(&self) -> &str {
        "\\session-delete <name or id>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = session_arg(ctx, self.usage())?;
        services::chat_service()?.delete(&name)?;
        ctx.println(format!("Deleted session '{}'", name));
        Ok(())
    }
}

/// `\session-list` — list sessions with the active marker.
pub struct SessionListCommand;

#[async_trait]
impl Command for SessionListCommand {
    fn name(&self) -> &str {
        "session-list"
    }

    fn description(&self) -> &str {
        "List chat sessions"
    }

    fn usage(&self) -> &str {
        "\\session-list"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let chat = services::chat_service()?;
        let active = chat.active_id();
        let sessions = chat.list();
        if sessions.is_empty() {
            ctx.println("No sessions");
            return Ok(());
        }
        for session in sessions {
            let marker = if active.as_deref() == Some(session.id.as_str()) {
                " [active]"
            } else {
                ""
            };
            ctx.println(format!(
                "{} ({} messages){}",
                session.name,
                session.message_count(),
                marker
            ));
        }
        Ok(())
    }
}

/// `\session-add-usermsg <text>` — append a user message.
pub struct SessionAddUserMsgCommand;

#[async_trait]
impl Command for SessionAddUserMsgCommand {
    fn name(&self) -> &str {
        "session-add-usermsg"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Append a user message to the active session"
    }

    fn usage(&self) -> &str {
        "\\session-add-usermsg <text>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let text = ctx.input.trim();
        if text.is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }
        let count = services::chat_service()?.add_user_message(text)?;
        services::variable_service()?
            .set_system_variable("#message_count", &count.to_string())?;
        Ok(())
    }
}

/// `\session-add-assistantmsg <text>` — append an assistant message.
pub struct SessionAddAssistantMsgCommand;

#[async_trait]
impl Command for SessionAddAssistantMsgCommand {
    fn name(&self) -> &str {
        "session-add-assistantmsg"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Append an assistant message to the active session"
    }

    fn usage(&self) -> &str {
        "\\session-add-assistantmsg <text>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let text = ctx.input.trim();
        if text.is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }
        let count = services::chat_service()?.add_assistant_message(text)?;
        services::variable_service()?
            .set_system_variable("#message_count", &count.to_string())?;
        Ok(())
    }
}

/// `\session-messagecount` — print the active session's message count.
pub struct SessionMessageCountCommand;

#[async_trait]
impl Command for SessionMessageCountCommand {
    fn name(&self) -> &str {
        "session-messagecount"
    }

    fn description(&self) -> &str {
        "Print the active session's message count"
    }

    fn usage(&self) -> &str {
        "\\session-messagecount"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let count = services::chat_service()?.message_count()?;
        services::variable_service()?
            .set_system_variable("#message_count", &count.to_string())?;
        ctx.println(format!("Messages: {}", count));
        Ok(())
    }
}
