//! The variable store.
//!
//! Single source of truth for user and system variables. Name classes are
//! decided by the first character:
//! - `#...` system-readonly (engine/service written, user-unwritable)
//! - `@...` computed environment mirrors (`@pwd`, `@user`, `@date`, ...)
//! - `_...` system names users may write only through the whitelist
//! - `1`, `2`, ... and `.1`, `.2`, ... — message-history views, derived
//! - anything else: ordinary user variable
//!
//! In test mode a per-process override map shadows the real environment so
//! tests stay hermetic.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;

use crate::error::{NeuroError, Result};
use crate::registry::Service;

/// The fixed set of `_` names a user may write.
pub const USER_WRITABLE_SYSTEM: &[&str] = &[
    "_style",
    "_editor",
    "_reply_way",
    "_echo_command",
    "_output",
    "_max_stack_depth",
    "_client_id",
    "_bash_timeout",
];

lazy_static! {
    static ref HISTORY_INDEX: Regex = Regex::new(r"^\.?[1-9][0-9]*$").expect("static regex");
}

/// Returns true if the name syntactically denotes a message-history view.
pub fn is_history_index(name: &str) -> bool {
    HISTORY_INDEX.is_match(name)
}

/// The variable service.
pub struct VariableService {
    store: RwLock<HashMap<String, String>>,
    env_overrides: RwLock<HashMap<String, String>>,
}

impl VariableService {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            env_overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Sets a variable through the user-facing rules.
    ///
    /// Writes to `#`/`@` names, to `_` names outside the whitelist, and to
    /// derived history views fail with `InvalidVariable`.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() {
            return Err(NeuroError::invalid_variable("variable name cannot be empty"));
        }
        if name.starts_with('#') || name.starts_with('@') {
            return Err(NeuroError::invalid_variable(format!(
                "'{}' is a system variable and cannot be set",
                name
            )));
        }
        if name.starts_with('_') && !USER_WRITABLE_SYSTEM.contains(&name) {
            return Err(NeuroError::invalid_variable(format!(
                "'{}' is not a user-writable system variable",
                name
            )));
        }
        if is_history_index(name) {
            return Err(NeuroError::invalid_variable(format!(
                "'{}' is a message-history view and cannot be set",
                name
            )));
        }
        self.store.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Sets a variable through the engine/service bypass.
    ///
    /// Computed `@` names stay rejected; everything else upserts.
    pub fn set_system_variable(&self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() {
            return Err(NeuroError::invalid_variable("variable name cannot be empty"));
        }
        if name.starts_with('@') {
            return Err(NeuroError::invalid_variable(format!(
                "'{}' is computed and cannot be stored",
                name
            )));
        }
        self.store.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Reads a variable.
    ///
    /// Resolution order: the store, computed `@` providers, message-history
    /// views, `#os.X` environment mirrors. History indices outside the active
    /// session read as empty strings; anything else undefined is
    /// `VariableNotFound`.
    pub fn get(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(NeuroError::variable_not_found(name));
        }
        if let Some(value) = self.store.read().get(name) {
            return Ok(value.clone());
        }
        if name.starts_with('@') {
            return self.computed(name);
        }
        if is_history_index(name) {
            return Ok(self.history_view(name));
        }
        if let Some(env_name) = name.strip_prefix("#os.") {
            return self
                .get_env(env_name)
                .ok_or_else(|| NeuroError::variable_not_found(name));
        }
        Err(NeuroError::variable_not_found(name))
    }

    /// Returns the environment value, honoring test overrides.
    pub fn get_env(&self, name: &str) -> Option<String> {
        if let Some(value) = self.env_overrides.read().get(name) {
            return Some(value.clone());
        }
        std::env::var(name).ok()
    }

    /// Shadows an environment variable for this process.
    ///
    /// Used by tests and by the `.env` configuration loader.
    pub fn set_env_override(&self, name: &str, value: &str) {
        self.env_overrides
            .write()
            .insert(name.to_string(), value.to_string());
    }

    /// Enumerates user variables plus currently-set system variables.
    ///
    /// Derived views and environment mirrors that were never materialized are
    /// not enumerated.
    pub fn get_all_variables(&self) -> BTreeMap<String, String> {
        self.store
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn computed(&self, name: &str) -> Result<String> {
        match name {
            "@pwd" => Ok(std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            "@user" => Ok(self
                .get_env("USER")
                .or_else(|| self.get_env("USERNAME"))
                .unwrap_or_default()),
            "@date" => Ok(chrono::Local::now().format("%Y-%m-%d").to_string()),
            "@time" => Ok(chrono::Local::now().format("%H:%M:%S").to_string()),
            "@hostname" => Ok(self.get_env("HOSTNAME").unwrap_or_default()),
            "@status" => Ok(self
                .store
                .read()
                .get("_status")
                .cloned()
                .unwrap_or_else(|| "0".to_string())),
            _ => Err(NeuroError::variable_not_found(name)),
        }
    }

    /// Resolves a message-history view against the active chat session.
    ///
    /// `N` counts from the newest message (1 = latest); `.N` counts from the
    /// oldest. Out-of-range indices and a missing session both read as "".
    fn history_view(&self, name: &str) -> String {
        let Ok(chat) = crate::services::chat_service() else {
            return String::new();
        };
        let Some(session) = chat.active_session() else {
            return String::new();
        };

        let count = session.messages.len();
        let (from_oldest, index_str) = match name.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let Ok(index) = index_str.parse::<usize>() else {
            return String::new();
        };
        if index == 0 || index > count {
            return String::new();
        }

        let position = if from_oldest { index - 1 } else { count - index };
        session.messages[position].content.clone()
    }
}

impl Default for VariableService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for VariableService {
    fn name(&self) -> &str {
        "variable"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
