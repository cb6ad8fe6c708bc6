//! The command execution engine.
//!
//! A single-threaded cooperative loop that drains the command stack. Each
//! frame runs through the pipeline: boundary handling → error-state reset →
//! command echo → interpolation → parsing → resolution → execution →
//! silent-aware output emission → error-state update. Control-flow commands
//! never recurse; they push frames back onto the same stack, which keeps the
//! engine iterative.

pub mod interpolator;
pub mod parser;

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{NeuroError, Result};
use crate::registry::global_command_registry;
use crate::services::stack::Boundary;
use crate::services::{self, StackService, DEFAULT_MAX_STACK_DEPTH};
use interpolator::interpolate;

/// Hard limit on stack iterations per `execute` call.
pub const MAX_ENGINE_ITERATIONS: usize = 10_000;

/// Bounded output-history ring size.
const OUTPUT_HISTORY_LIMIT: usize = 100;

/// Shared truthiness rule for conditionals and engine flags.
///
/// Lowercase, trim. Empty is false; the enumerated false words are false;
/// everything else (including arbitrary identifiers and Unicode glyphs) is
/// true.
pub fn is_truthy(value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "" => false,
        "false" | "0" | "no" | "off" | "disabled" => false,
        _ => true,
    }
}

/// Per-frame execution context handed to commands.
///
/// Carries the parsed options and input, the raw (un-interpolated) frame for
/// commands that re-push themselves, and the output buffer the engine
/// captures around `execute`.
pub struct ExecutionContext {
    /// Parsed option block.
    pub options: HashMap<String, String>,
    /// Input text after the option block.
    pub input: String,
    /// The frame exactly as it was popped, before interpolation.
    pub raw_frame: String,
    /// True while a silent block suppresses stdout.
    pub in_silent_block: bool,
    captured: String,
    streamed: String,
}

impl ExecutionContext {
    /// Creates a context for one command execution.
    pub fn new(
        options: HashMap<String, String>,
        input: String,
        raw_frame: String,
        in_silent_block: bool,
    ) -> Self {
        Self {
            options,
            input,
            raw_frame,
            in_silent_block,
            captured: String::new(),
            streamed: String::new(),
        }
    }

    /// Buffers output without a trailing newline.
    pub fn print(&mut self, text: impl AsRef<str>) {
        self.captured.push_str(text.as_ref());
    }

    /// Buffers one output line.
    pub fn println(&mut self, text: impl AsRef<str>) {
        self.captured.push_str(text.as_ref());
        self.captured.push('\n');
    }

    /// Emits a streaming chunk immediately (unless silenced) and records it.
    ///
    /// Used by streaming LLM output so chunks appear as they arrive instead
    /// of after the command returns.
    pub fn emit_chunk(&mut self, text: &str) {
        if !self.in_silent_block {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        self.streamed.push_str(text);
    }

    /// Returns what the command has buffered so far.
    pub fn captured(&self) -> &str {
        &self.captured
    }

    fn into_buffers(self) -> (String, String) {
        (self.captured, self.streamed)
    }
}

/// The command execution engine.
///
/// Owns no persistent data beyond the output-history ring; it borrows the
/// stack, variable, and error services through the global registry.
pub struct Engine {
    echo_commands: AtomicBool,
    output_history: Mutex<VecDeque<String>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            echo_commands: AtomicBool::new(false),
            output_history: Mutex::new(VecDeque::new()),
        }
    }

    /// Executes one raw input line, draining the stack it grows.
    pub async fn execute(&self, input: &str) -> Result<()> {
        let line = input.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(());
        }

        let stack = services::stack_service()?;
        self.refresh_engine_config(&stack)?;
        stack.push_command(line);
        self.sync_overflow_flag(&stack)?;
        self.process_stack(&stack).await
    }

    /// Returns a copy of the bounded output-history ring, oldest first.
    pub fn output_history(&self) -> Vec<String> {
        self.output_history.lock().iter().cloned().collect()
    }

    async fn process_stack(&self, stack: &Arc<StackService>) -> Result<()> {
        let mut iterations = 0usize;

        while let Some(frame) = stack.pop_command() {
            iterations += 1;
            if iterations > MAX_ENGINE_ITERATIONS {
                stack.clear();
                return Err(NeuroError::InfiniteLoop(MAX_ENGINE_ITERATIONS));
            }

            match self.process_frame(stack, &frame).await {
                Ok(()) => {}
                Err(NeuroError::Exit) => {
                    stack.clear();
                    return Err(NeuroError::Exit);
                }
                Err(e) if e.is_fatal() => {
                    stack.clear();
                    return Err(e);
                }
                Err(e) => {
                    let errors = services::error_state_service()?;
                    errors.set_error(&e.to_string())?;
                    if stack.is_in_try_block() {
                        tracing::debug!(error = %e, "Captured error in try block");
                        self.skip_to_try_end(stack);
                    } else {
                        self.sync_overflow_flag(stack)?;
                        // Unrecovered: abandon pending frames so boundary
                        // depths cannot go stale across executes.
                        stack.clear();
                        return Err(e);
                    }
                }
            }

            self.sync_overflow_flag(stack)?;
            self.refresh_engine_config(stack)?;
        }

        Ok(())
    }

    async fn process_frame(&self, stack: &Arc<StackService>, raw: &str) -> Result<()> {
        if let Some(boundary) = Boundary::parse(raw) {
            match boundary {
                Boundary::ErrorStart(id) => stack.push_error_boundary(id),
                Boundary::ErrorEnd(id) => stack.pop_error_boundary(id),
                Boundary::SilentStart(id) => stack.push_silent_boundary(id),
                Boundary::SilentEnd(id) => stack.pop_silent_boundary(id),
            }
            return Ok(());
        }
        if raw.trim().is_empty() {
            return Ok(());
        }

        let registry = global_command_registry();
        let vars = services::variable_service()?;
        let errors = services::error_state_service()?;

        // Free text is an implicit LLM send.
        let effective = if raw.starts_with('\\') {
            raw.to_string()
        } else {
            format!("\\send {}", raw)
        };

        // Error state resets on entry unless the command is recognized and
        // read-only; unknown and malformed lines reset too.
        let pre_resolved = parser::command_name(&effective).and_then(|n| registry.get(n));
        let skip_reset = pre_resolved
            .as_ref()
            .map(|c| c.is_read_only())
            .unwrap_or(false);
        if !skip_reset {
            errors.reset()?;
        }

        let in_silent = stack.is_in_silent_block();
        if self.echo_commands.load(Ordering::Relaxed) && !in_silent {
            println!("%%> {}", raw);
        }

        let interpolated = interpolate(&effective, &vars);
        let name = parser::command_name(&interpolated)
            .ok_or_else(|| NeuroError::parse(format!("not a command: {:?}", interpolated)))?
            .to_string();
        let command = registry
            .get(&name)
            .ok_or_else(|| NeuroError::execution(format!("Unknown command: \\{}", name)))?;

        let parsed = parser::parse_command(&interpolated, command.parse_mode())?;
        let mut ctx =
            ExecutionContext::new(parsed.options, parsed.input, raw.to_string(), in_silent);

        let started = Instant::now();
        let result = command.execute(&mut ctx).await;
        tracing::debug!(
            command = %name,
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Executed command"
        );

        // Silent blocks discard the capture entirely; otherwise re-emit it
        // and append it to the history ring.
        let (captured, streamed) = ctx.into_buffers();
        if !in_silent {
            if !captured.is_empty() {
                print!("{}", captured);
                let _ = std::io::stdout().flush();
            }
            self.record_output(&captured, &streamed);
        }

        match result {
            Ok(()) => {
                if !command.is_read_only() {
                    errors.set_success()?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Pops frames until the matching try END marker is consumed, keeping
    /// silent depth consistent across the unwind.
    fn skip_to_try_end(&self, stack: &Arc<StackService>) {
        let Some(target) = stack.current_try_id() else {
            return;
        };
        while let Some(frame) = stack.pop_command() {
            match Boundary::parse(&frame) {
                Some(Boundary::SilentStart(id)) => stack.push_silent_boundary(id),
                Some(Boundary::SilentEnd(id)) => stack.pop_silent_boundary(id),
                Some(Boundary::ErrorStart(id)) => stack.push_error_boundary(id),
                Some(Boundary::ErrorEnd(id)) => {
                    stack.pop_error_boundary(id);
                    if id == target {
                        break;
                    }
                }
                None => {}
            }
        }
    }

    /// Appends a command's captured output to the history ring.
    ///
    /// Never fails; output capture must not destabilize the engine.
    fn record_output(&self, captured: &str, streamed: &str) {
        let mut combined = String::with_capacity(streamed.len() + captured.len());
        combined.push_str(streamed);
        combined.push_str(captured);
        if combined.is_empty() {
            return;
        }
        let mut history = self.output_history.lock();
        if history.len() >= OUTPUT_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(combined);
    }

    /// Re-reads `_echo_command` and `_max_stack_depth` after each command.
    fn refresh_engine_config(&self, stack: &Arc<StackService>) -> Result<()> {
        let vars = services::variable_service()?;

        let echo = vars
            .get("_echo_command")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        self.echo_commands.store(echo, Ordering::Relaxed);

        let depth = vars
            .get("_max_stack_depth")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_STACK_DEPTH);
        stack.set_max_depth(depth);
        Ok(())
    }

    /// Publishes `#stack_overflow` when the depth guard dropped a push.
    fn sync_overflow_flag(&self, stack: &Arc<StackService>) -> Result<()> {
        if stack.take_overflow() {
            let vars = services::variable_service()?;
            vars.set_system_variable("#stack_overflow", "true")?;
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
