//! Model commands: model-new, model-activate, model-delete, model-list.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::engine::ExecutionContext;
use crate::error::{NeuroError, Result};
use crate::llm::Provider;
use crate::registry::Command;
use crate::services;

/// Option keys with dedicated meaning; everything else becomes a parameter.
const RESERVED_KEYS: &[&str] = &["name", "provider", "base_model"];

/// Parses a free-form option value into a JSON parameter value.
///
/// Numbers and booleans keep their type so providers receive proper JSON.
fn parameter_value(raw: &str) -> serde_json::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::json!(f);
    }
    match raw {
        "true" => serde_json::json!(true),
        "false" => serde_json::json!(false),
        _ => serde_json::json!(raw),
    }
}

fn model_arg(ctx: &ExecutionContext, usage: &str) -> Result<String> {
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

/// `\model-new[name=..., provider=..., base_model=..., ...]` — create and
/// activate a model. Unreserved options become call parameters.
pub struct ModelNewCommand;

#[async_trait]
impl Command for ModelNewCommand {
    fn name(&self) -> &str {
        "model-new"
    }

    fn description(&self) -> &str {
        "Create a model configuration and make it active"
    }

    fn usage(&self) -> &str {
        "\\model-new[name=<name>, provider=<provider>, base_model=<model>, temperature=..., ...]"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = model_arg(ctx, self.usage())?;
        let provider: Provider = ctx
            .options
            .get("provider")
            .map(String::as_str)
            .unwrap_or("openai")
            .parse()
            .map_err(|_| NeuroError::usage(self.usage()))?;
        let base_model = ctx
            .options
            .get("base_model")
            .filter(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| provider.default_base_model().to_string());

        let parameters: HashMap<String, serde_json::Value> = ctx
            .options
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), parameter_value(v)))
            .collect();

        let models = services::model_service()?;
        let model = models.create_model(&name, provider, &base_model, parameters)?;

        let vars = services::variable_service()?;
        vars.set_system_variable("#model_id", &model.id)?;
        vars.set_system_variable("#model_name", &model.name)?;
        vars.set_system_variable("#model_provider", model.provider.as_str())?;

        ctx.println(format!(
            "Created model '{}' ({}/{})",
            model.name, model.provider, model.base_model
        ));
        Ok(())
    }
}

/// `\model-activate <name>` — switch the active model.
pub struct ModelActivateCommand;

#[async_trait]
impl Command for ModelActivateCommand {
    fn name(&self) -> &str {
        "model-activate"
    }

    fn description(&self) -> &str {
        "Make a model configuration the active one"
    }

    fn usage(&self) -> &str {
        "\\model-activate <name or id>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = model_arg(ctx, self.usage())?;
        let models = services::model_service()?;
        let id = models.activate(&name)?;

        let model = models
            .active_model()
            .ok_or_else(|| NeuroError::execution("no active model"))?;
        let vars = services::variable_service()?;
        vars.set_system_variable("#model_id", &id)?;
        vars.set_system_variable("#model_name", &model.name)?;
        vars.set_system_variable("#model_provider", model.provider.as_str())?;

        ctx.println(format!("Activated model '{}'", model.name));
        Ok(())
    }
}

/// `\model-delete <name>` — delete a model configuration.
pub struct ModelDeleteCommand;

#[async_trait]
impl Command for ModelDeleteCommand {
    fn name(&self) -> &str {
        "model-delete"
    }

    fn description(&self) -> &str {
        "Delete a model configuration"
    }

    fn usage(&self) -> &str {
        "\\model-delete <name or id>"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = model_arg(ctx, self.usage())?;
        services::model_service()?.delete(&name)?;
        ctx.println(format!("Deleted model '{}'", name));
        Ok(())
    }
}

/// `\model-list` — list model configurations.
pub struct ModelListCommand;

#[async_trait]
impl Command for ModelListCommand {
    fn name(&self) -> &str {
        "model-list"
    }

    fn description(&self) -> &str {
        "List model configurations"
    }

    fn usage(&self) -> &str {
        "\\model-list"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let models = services::model_service()?;
        let active = models.active_id();
        let list = models.list();
        if list.is_empty() {
            ctx.println("No models");
            return Ok(());
        }
        for model in list {
            let marker = if active.as_deref() == Some(model.id.as_str()) {
                " [active]"
            } else {
                ""
            };
            ctx.println(format!(
                "{} ({}/{}){}",
                model.name, model.provider, model.base_model, marker
            ));
        }
        Ok(())
    }
}
