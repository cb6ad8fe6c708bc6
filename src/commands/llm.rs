//! LLM orchestration commands: llm-client-get, llm-call, send, _send.
//!
//! Client, model, and session are three independent artifacts; `llm-call`
//! composes them at the last moment, filling defaults from `${_client_id}`,
//! the active model, and the active session.

use async_trait::async_trait;
use futures::StreamExt;

use crate::engine::parser::{self, ParseMode};
use crate::engine::{is_truthy, ExecutionContext};
use crate::error::{NeuroError, Result};
use crate::llm::{ClientHandle, Provider};
use crate::registry::Command;
use crate::services;
use crate::services::chat::ChatSession;
use crate::services::model::ModelConfig;

/// `\llm-client-get[provider=..., key=...]` — obtain or create a cached
/// client and publish its ID in `_client_id`.
pub struct LlmClientGetCommand;

#[async_trait]
impl Command for LlmClientGetCommand {
    fn name(&self) -> &str {
        "llm-client-get"
    }

    fn description(&self) -> &str {
        "Obtain a cached LLM client for a provider"
    }

    fn usage(&self) -> &str {
        "\\llm-client-get[provider=openai|anthropic|mock, key=<api key>]"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let provider: Provider = ctx
            .options
            .get("provider")
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .unwrap_or("openai")
            .parse()
            .map_err(|_| NeuroError::usage(self.usage()))?;
        let key = ctx.options.get("key").filter(|k| !k.is_empty()).cloned();

        let factory = services::client_factory_service()?;
        let (handle, created) = factory.get_or_create(provider, key)?;

        let vars = services::variable_service()?;
        vars.set_system_variable("_client_id", &handle.id)?;
        vars.set_system_variable("#client_provider", provider.as_str())?;
        vars.set_system_variable("#client_count", &factory.client_count().to_string())?;
        vars.set_system_variable("#client_created", if created { "true" } else { "false" })?;

        ctx.println(format!("Client ready: {} ({})", handle.id, provider));
        Ok(())
    }
}

/// Resolves the `(client, model, session)` triple for a completion.
fn resolve_artifacts(
    ctx: &ExecutionContext,
) -> Result<(ClientHandle, ModelConfig, ChatSession)> {
    let vars = services::variable_service()?;

    let client_id = ctx
        .options
        .get("client_id")
        .filter(|c| !c.is_empty())
        .cloned()
        .or_else(|| vars.get("_client_id").ok().filter(|c| !c.is_empty()))
        .ok_or_else(|| {
            NeuroError::execution("no client configured; run \\llm-client-get first")
        })?;
    let handle = services::client_factory_service()?
        .get(&client_id)
        .ok_or_else(|| {
            NeuroError::execution(format!(
                "no client '{}' in cache; run \\llm-client-get",
                client_id
            ))
        })?;

    let models = services::model_service()?;
    let model = match ctx.options.get("model_id").filter(|m| !m.is_empty()) {
        Some(wanted) => models
            .find(wanted)
            .ok_or_else(|| NeuroError::execution(format!("no model '{}'", wanted)))?,
        None => models
            .active_model()
            .ok_or_else(|| NeuroError::execution("no active model; run \\model-new first"))?,
    };

    let chat = services::chat_service()?;
    let session = match ctx.options.get("session_id").filter(|s| !s.is_empty()) {
        Some(wanted) => chat
            .find(wanted)
            .ok_or_else(|| NeuroError::execution(format!("no session '{}'", wanted)))?,
        None => chat
            .active_session()
            .ok_or_else(|| NeuroError::execution("no active session; run \\session-new first"))?,
    };

    Ok((handle, model, session))
}

/// Drives a completion (sync or streaming), prints the response, and writes
/// the result variables. Shared by `llm-call` and `_send`.
async fn run_completion(
    ctx: &mut ExecutionContext,
    handle: &ClientHandle,
    model: &ModelConfig,
    session: &ChatSession,
    stream: bool,
) -> Result<String> {
    let llm = services::llm_service()?;
    let vars = services::variable_service()?;

    let outcome = async {
        if stream {
            let mut chunks = llm
                .stream_completion(&handle.client, model, session)
                .await?;
            let mut full = String::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if !chunk.content.is_empty() {
                    ctx.emit_chunk(&chunk.content);
                    full.push_str(&chunk.content);
                }
                if chunk.done {
                    break;
                }
            }
            ctx.emit_chunk("\n");
            Ok(full)
        } else {
            let response = llm.send_completion(&handle.client, model, session).await?;
            ctx.println(&response);
            Ok(response)
        }
    }
    .await;

    match outcome {
        Ok(response) => {
            vars.set_system_variable("_output", &response)?;
            vars.set_system_variable("#llm_response", &response)?;
            vars.set_system_variable("#llm_call_success", "true")?;
            vars.set_system_variable(
                "#llm_call_mode",
                if stream { "streaming" } else { "sync" },
            )?;
            Ok(response)
        }
        Err(e) => {
            vars.set_system_variable("#llm_call_success", "false")?;
            Err(e)
        }
    }
}

/// `\llm-call[client_id=, model_id=, session_id=, stream=, dry_run=]`.
pub struct LlmCallCommand;

impl LlmCallCommand {
    /// Prints the assembled payload without touching the client.
    fn print_dry_run(
        ctx: &mut ExecutionContext,
        handle: &ClientHandle,
        model: &ModelConfig,
        session: &ChatSession,
    ) {
        ctx.println(format!("Client: {} ({})", handle.id, handle.provider));
        ctx.println(format!("Model: {} ({})", model.name, model.base_model));
        ctx.println("Configuration:");
        let mut params: Vec<(&String, &serde_json::Value)> = model.parameters.iter().collect();
        params.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in params {
            ctx.println(format!("  {}: {}", key, value));
        }
        ctx.println(format!(
            "System: {}",
            session.system_prompt.as_deref().unwrap_or("(none)")
        ));
        ctx.println("Messages:");
        for (i, message) in session.messages.iter().enumerate() {
            ctx.println(format!(
                "  [{}] {}: {}",
                i + 1,
                message.role.as_str(),
                message.content
            ));
        }
        ctx.println(format!("Total Messages: {}", session.messages.len()));
        ctx.println(DRY_RUN_OUTPUT);
    }
}

const DRY_RUN_OUTPUT: &str = "DRY RUN - No API call made";

#[async_trait]
impl Command for LlmCallCommand {
    fn name(&self) -> &str {
        "llm-call"
    }

    fn description(&self) -> &str {
        "Send the composed client/model/session to the LLM"
    }

    fn usage(&self) -> &str {
        "\\llm-call[client_id=..., model_id=..., session_id=..., stream=true, dry_run=true]"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let stream = ctx
            .options
            .get("stream")
            .map(|v| is_truthy(v))
            .unwrap_or(false);
        let dry_run = ctx
            .options
            .get("dry_run")
            .map(|v| is_truthy(v))
            .unwrap_or(false);

        let (handle, model, session) = resolve_artifacts(ctx)?;

        if dry_run {
            Self::print_dry_run(ctx, &handle, &model, &session);
            let vars = services::variable_service()?;
            vars.set_system_variable("_output", DRY_RUN_OUTPUT)?;
            vars.set_system_variable("#dry_run_mode", "true")?;
            vars.set_system_variable("#dry_run_client_id", &handle.id)?;
            vars.set_system_variable("#dry_run_model", &model.name)?;
            vars.set_system_variable("#dry_run_provider", handle.provider.as_str())?;
            vars.set_system_variable(
                "#dry_run_message_count",
                &session.messages.len().to_string(),
            )?;
            return Ok(());
        }

        run_completion(ctx, &handle, &model, &session, stream).await?;
        Ok(())
    }
}

/// `\send <text>` — thin delegator that pushes `\_send <text>`.
pub struct SendCommand;

#[async_trait]
impl Command for SendCommand {
    fn name(&self) -> &str {
        "send"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Send text to the active LLM session"
    }

    fn usage(&self) -> &str {
        "\\send <message>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        // Delegate the raw text so interpolation happens exactly once, when
        // \_send executes.
        let text = if ctx.raw_frame.starts_with("\\send") {
            parser::parse_command(&ctx.raw_frame, ParseMode::Raw)
                .map(|p| p.input)
                .unwrap_or_else(|_| ctx.input.clone())
        } else {
            // Free text rewritten by the engine; the raw frame is the text.
            ctx.raw_frame.clone()
        };
        if text.trim().is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }

        services::stack_service()?.push_command(format!("\\_send {}", text));
        Ok(())
    }
}

/// `\_send <text>` — the default reply pipeline.
///
/// Appends the user message, runs the completion per `_reply_way`
/// (`stream` or sync), and appends the assistant message.
pub struct SendDelegateCommand;

#[async_trait]
impl Command for SendDelegateCommand {
    fn name(&self) -> &str {
        "_send"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Append a user message, call the LLM, and record the reply"
    }

    fn usage(&self) -> &str {
        "\\_send <message>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let text = ctx.input.trim().to_string();
        if text.is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }

        let vars = services::variable_service()?;
        let chat = services::chat_service()?;
        chat.add_user_message(&text)?;

        let (handle, model, session) = resolve_artifacts(ctx)?;
        let stream = vars
            .get("_reply_way")
            .map(|v| v.trim().eq_ignore_ascii_case("stream"))
            .unwrap_or(false);

        let response = run_completion(ctx, &handle, &model, &session, stream).await?;

        let count = chat.add_assistant_message(&response)?;
        vars.set_system_variable("#message_count", &count.to_string())?;
        Ok(())
    }
}
