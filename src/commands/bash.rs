//! The bash command.

use std::time::Duration;

use async_trait::async_trait;

use crate::engine::parser::ParseMode;
use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};
use crate::registry::Command;
use crate::services;

/// `\bash <command line>` — run a shell subprocess.
///
/// Stdout and stderr are captured and re-emitted through the engine; the
/// exit code lands in `#bash_exit_code` and stdout in `_output`. A nonzero
/// exit is recorded, not raised — scripts branch on the exit code. The
/// whitelisted `_bash_timeout` variable (seconds) bounds the run; unset
/// means no timeout.
pub struct BashCommand;

#[async_trait]
impl Command for BashCommand {
    fn name(&self) -> &str {
        "bash"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn description(&self) -> &str {
        "Run a shell command and capture its output"
    }

    fn usage(&self) -> &str {
        "\\bash <command line>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let cmdline = ctx.input.trim();
        if cmdline.is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }

        let vars = services::variable_service()?;
        let timeout_secs = vars
            .get("_bash_timeout")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok());

        let future = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmdline)
            .output();

        let output = match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), future)
                .await
                .map_err(|_| {
                    NeuroError::execution(format!("command timed out after {}s", secs))
                })?,
            None => future.await,
        }
        .map_err(|e| NeuroError::execution(format!("failed to run shell: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        ctx.print(&stdout);
        if !stderr.is_empty() {
            ctx.print(&stderr);
        }

        vars.set_system_variable("#bash_exit_code", &exit_code.to_string())?;
        vars.set_system_variable("_output", stdout.trim_end_matches('\n'))?;

        tracing::debug!(exit_code, stdout_len = stdout.len(), "bash finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata() {
        assert_eq!(BashCommand.name(), "bash");
        assert_eq!(BashCommand.parse_mode(), ParseMode::Raw);
        assert!(!BashCommand.is_read_only());
    }
}
