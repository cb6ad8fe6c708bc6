//! The echo command.

use async_trait::async_trait;

use crate::engine::{is_truthy, ExecutionContext};
use crate::error::Result;
use crate::registry::Command;
use crate::services;

/// `\echo[raw=true|false] <text>` — print text and record it in `_output`.
///
/// With `raw=false` the usual backslash escapes (`\n`, `\t`, `\r`, `\\`) are
/// interpreted. Stdout gains the trailing newline; `_output` stores the text
/// without it.
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Print text to stdout and store it in _output"
    }

    fn usage(&self) -> &str {
        "\\echo[raw=false] <text>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let raw = ctx
            .options
            .get("raw")
            .map(|v| is_truthy(v))
            .unwrap_or(true);

        let text = if raw {
            ctx.input.clone()
        } else {
            interpret_escapes(&ctx.input)
        };

        ctx.println(&text);
        services::variable_service()?.set_system_variable("_output", &text)?;
        Ok(())
    }
}

/// Interprets `\n`, `\t`, `\r` and `\\`; unknown escapes stay literal.
fn interpret_escapes(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_escapes_newline_and_tab() {
        assert_eq!(interpret_escapes(r"Line1\nLine2"), "Line1\nLine2");
        assert_eq!(interpret_escapes(r"a\tb"), "a\tb");
        assert_eq!(interpret_escapes(r"a\\n"), "a\\n");
    }

    #[test]
    fn test_interpret_escapes_unknown_kept() {
        assert_eq!(interpret_escapes(r"a\qb"), "a\\qb");
        assert_eq!(interpret_escapes("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_metadata() {
        assert_eq!(EchoCommand.name(), "echo");
        assert!(!EchoCommand.is_read_only());
    }
}
