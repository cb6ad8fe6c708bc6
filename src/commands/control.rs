//! Control-flow commands: try, silent, if, if-not, while.
//!
//! None of these recurse. Each decides what to push back onto the command
//! stack: boundary triples for try/silent, the branch body for if, and for
//! while the body plus a copy of the whole raw frame so the next iteration
//! re-interpolates the condition template.

use async_trait::async_trait;

use crate::engine::parser::{self, ParseMode};
use crate::engine::{is_truthy, ExecutionContext};
use crate::error::{NeuroError, Result};
use crate::registry::Command;
use crate::services::{self, Boundary};

/// Extracts the un-interpolated body from the raw frame.
///
/// Falls back to the interpolated input when the raw frame no longer parses
/// (it always should; the frame was parsed once already).
fn raw_body(ctx: &ExecutionContext, mode: ParseMode) -> String {
    parser::parse_command(&ctx.raw_frame, mode)
        .map(|parsed| parsed.input)
        .unwrap_or_else(|_| ctx.input.clone())
}

/// `\try <command>` — capture errors from the inner command.
pub struct TryCommand;

#[async_trait]
impl Command for TryCommand {
    fn name(&self) -> &str {
        "try"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Run a command, capturing any error into _status/_error"
    }

    fn usage(&self) -> &str {
        "\\try \\command-that-may-fail"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let inner = raw_body(ctx, ParseMode::Raw);
        let inner = inner.trim();
        if inner.is_empty() {
            return Ok(());
        }

        let stack = services::stack_service()?;
        let id = stack.next_boundary_id();
        // Reverse push order: START pops first, then the inner command.
        stack.push_command(Boundary::ErrorEnd(id).frame());
        stack.push_command(inner);
        stack.push_command(Boundary::ErrorStart(id).frame());
        Ok(())
    }
}

/// `\silent <command>` — suppress the inner command's stdout.
pub struct SilentCommand;

#[async_trait]
impl Command for SilentCommand {
    fn name(&self) -> &str {
        "silent"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Run a command with stdout suppressed"
    }

    fn usage(&self) -> &str {
        "\\silent \\command"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let inner = raw_body(ctx, ParseMode::Raw);
        let inner = inner.trim();
        if inner.is_empty() {
            // Empty input is a no-op.
            return Ok(());
        }

        let stack = services::stack_service()?;
        let id = stack.next_boundary_id();
        stack.push_command(Boundary::SilentEnd(id).frame());
        stack.push_command(inner);
        stack.push_command(Boundary::SilentStart(id).frame());
        Ok(())
    }
}

/// `\if[condition=X] <command>` — push the body when X is truthy.
pub struct IfCommand;

#[async_trait]
impl Command for IfCommand {
    fn name(&self) -> &str {
        "if"
    }

    fn description(&self) -> &str {
        "Run a command when the condition is truthy"
    }

    fn usage(&self) -> &str {
        "\\if[condition=<value>] \\command"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let condition = ctx
            .options
            .get("condition")
            .ok_or_else(|| NeuroError::usage(self.usage()))?;
        let truthy = is_truthy(condition);

        let vars = services::variable_service()?;
        vars.set_system_variable("#if_result", if truthy { "true" } else { "false" })?;

        if truthy {
            let body = raw_body(ctx, ParseMode::KeyValue);
            let body = body.trim();
            if !body.is_empty() {
                services::stack_service()?.push_command(body);
            }
        }
        Ok(())
    }
}

/// `\if-not[condition=X] <command>` — inverse of `\if`.
pub struct IfNotCommand;

#[async_trait]
impl Command for IfNotCommand {
    fn name(&self) -> &str {
        "if-not"
    }

    fn description(&self) -> &str {
        "Run a command when the condition is falsy"
    }

    fn usage(&self) -> &str {
        "\\if-not[condition=<value>] \\command"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let condition = ctx
            .options
            .get("condition")
            .ok_or_else(|| NeuroError::usage(self.usage()))?;
        let run = !is_truthy(condition);

        let vars = services::variable_service()?;
        vars.set_system_variable("#if_not_result", if run { "true" } else { "false" })?;

        if run {
            let body = raw_body(ctx, ParseMode::KeyValue);
            let body = body.trim();
            if !body.is_empty() {
                services::stack_service()?.push_command(body);
            }
        }
        Ok(())
    }
}

/// `\while[condition=X] <command>` — loop while X stays truthy.
///
/// Each iteration re-pushes the raw frame, so the condition template
/// re-interpolates against current variable values. The stack depth guard
/// silently drops the re-push, which terminates runaway loops.
pub struct WhileCommand;

#[async_trait]
impl Command for WhileCommand {
    fn name(&self) -> &str {
        "while"
    }

    fn description(&self) -> &str {
        "Repeat a command while the condition stays truthy"
    }

    fn usage(&self) -> &str {
        "\\while[condition=<value>] \\command"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let condition = ctx
            .options
            .get("condition")
            .ok_or_else(|| NeuroError::usage(self.usage()))?;
        let truthy = is_truthy(condition);

        let vars = services::variable_service()?;
        vars.set_system_variable("#while_result", if truthy { "true" } else { "false" })?;

        if !truthy {
            return Ok(());
        }

        let stack = services::stack_service()?;
        // The raw frame goes beneath the body: body runs first, then the
        // loop re-evaluates.
        stack.push_command(ctx.raw_frame.clone());
        let body = raw_body(ctx, ParseMode::KeyValue);
        let body = body.trim();
        if !body.is_empty() {
            stack.push_command(body);
        }
        Ok(())
    }
}
