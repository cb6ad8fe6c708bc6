//! Variable commands: set, get, get-env, vars.

use async_trait::async_trait;
use regex::Regex;

use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};
use crate::registry::Command;
use crate::services;

/// `\set[name=value]` — write user variables.
pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    fn name(&self) -> &str {
        "set"
    }

    fn description(&self) -> &str {
        "Set one or more variables"
    }

    fn usage(&self) -> &str {
        "\\set[name=value, ...]"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        if ctx.options.is_empty() {
            return Err(NeuroError::usage(self.usage()));
        }
        let vars = services::variable_service()?;
        for (name, value) in &ctx.options {
            vars.set(name, value)?;
        }
        Ok(())
    }
}

/// `\get[name]` — print a variable.
///
/// Read-only so a failed command's `_status`/`_error` can be inspected.
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    fn name(&self) -> &str {
        "get"
    }

    fn description(&self) -> &str {
        "Print a variable's value"
    }

    fn usage(&self) -> &str {
        "\\get[name]"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        if ctx.options.len() != 1 {
            return Err(NeuroError::usage(self.usage()));
        }
        let name = ctx.options.keys().next().cloned().unwrap_or_default();
        let value = services::variable_service()?.get(&name)?;
        ctx.println(format!("{} = {}", name, value));
        Ok(())
    }
}

/// `\get-env NAME` — mirror an environment variable into `#os.NAME`.
pub struct GetEnvCommand;

#[async_trait]
impl Command for GetEnvCommand {
    fn name(&self) -> &str {
        "get-env"
    }

    fn description(&self) -> &str {
        "Mirror an OS environment variable into #os.<NAME>"
    }

    fn usage(&self) -> &str {
        "\\get-env NAME"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = if !ctx.input.trim().is_empty() {
            ctx.input.trim().to_string()
        } else {
            ctx.options
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| NeuroError::usage(self.usage()))?
        };

        let vars = services::variable_service()?;
        let value = vars.get_env(&name).unwrap_or_default();
        let mirror = format!("#os.{}", name);
        vars.set_system_variable(&mirror, &value)?;
        ctx.println(format!("{} = {}", mirror, value));
        Ok(())
    }
}

/// `\vars[pattern=...]` — list variables, optionally filtered.
pub struct VarsCommand;

#[async_trait]
impl Command for VarsCommand {
    fn name(&self) -> &str {
        "vars"
    }

    fn description(&self) -> &str {
        "List variables, optionally filtered by a regex pattern"
    }

    fn usage(&self) -> &str {
        "\\vars[pattern=<regex>]"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let filter = match ctx.options.get("pattern").filter(|p| !p.is_empty()) {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                NeuroError::execution(format!("invalid pattern '{}': {}", pattern, e))
            })?),
            None => None,
        };

        let all = services::variable_service()?.get_all_variables();
        for (name, value) in &all {
            if filter.as_ref().map(|re| re.is_match(name)).unwrap_or(true) {
                ctx.println(format!("{} = {}", name, value));
            }
        }
        Ok(())
    }
}
