//! Configuration loading.
//!
//! Two `.env` files are probed at startup: one in the user's config
//! directory and one in the current working directory. Their entries land in
//! the variable service's environment override map (never the process
//! environment), and the probe results are published as system variables so
//! scripts can inspect what was loaded.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::registry::Service;
use crate::services::{self, VariableService};

/// The configuration service.
pub struct ConfigService;

impl ConfigService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ConfigService {
    fn name(&self) -> &str {
        "config"
    }

    fn initialize(&self) -> Result<()> {
        let vars = services::variable_service()?;

        if let Some(path) = config_env_path() {
            load_env_file(&vars, &path, "#config_env_loaded", "#config_env_path")?;
        } else {
            vars.set_system_variable("#config_env_loaded", "false")?;
        }

        load_env_file(
            &vars,
            &local_env_path(),
            "#local_env_loaded",
            "#local_env_path",
        )?;
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Loads one `.env` file into the variable service's override map.
///
/// Publishes `flag_var` ("true"/"false") and `path_var` regardless of
/// outcome; a malformed file logs a warning and reads as not loaded.
pub fn load_env_file(
    vars: &VariableService,
    path: &Path,
    flag_var: &str,
    path_var: &str,
) -> Result<()> {
    vars.set_system_variable(path_var, &path.display().to_string())?;

    if !path.exists() {
        vars.set_system_variable(flag_var, "false")?;
        return Ok(());
    }

    match dotenvy::from_path_iter(path) {
        Ok(entries) => {
            let mut count = 0usize;
            for entry in entries {
                match entry {
                    Ok((key, value)) => {
                        vars.set_env_override(&key, &value);
                        count += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping bad .env line");
                    }
                }
            }
            tracing::info!(path = %path.display(), count, "Loaded .env file");
            vars.set_system_variable(flag_var, "true")?;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read .env file");
            vars.set_system_variable(flag_var, "false")?;
        }
    }
    Ok(())
}

/// The config-directory `.env` probe location.
pub fn config_env_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("neuroshell").join(".env"))
}

/// The working-directory `.env` probe location.
pub fn local_env_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".env")
}

/// The startup script location, if the file exists.
pub fn neurorc_path() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".neurorc"))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_env_file_missing_reports_false() {
        let vars = VariableService::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        load_env_file(&vars, &path, "#config_env_loaded", "#config_env_path").unwrap();

        assert_eq!(vars.get("#config_env_loaded").unwrap(), "false");
        assert_eq!(
            vars.get("#config_env_path").unwrap(),
            path.display().to_string()
        );
    }

    #[test]
    fn test_load_env_file_populates_overrides() {
        let vars = VariableService::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "NEURO_TEST_KEY=abc123").unwrap();
        writeln!(file, "OTHER=value").unwrap();

        load_env_file(&vars, &path, "#local_env_loaded", "#local_env_path").unwrap();

        assert_eq!(vars.get("#local_env_loaded").unwrap(), "true");
        assert_eq!(vars.get_env("NEURO_TEST_KEY").unwrap(), "abc123");
        assert_eq!(vars.get_env("OTHER").unwrap(), "value");
    }

    #[test]
    fn test_local_env_path_points_at_cwd() {
        assert!(local_env_path().ends_with(".env"));
    }
}
