//! Error state.
//!
//! Owns the canonical `_status`/`_error` pair plus the `#last_status`/
//! `#last_error` snapshots taken when the engine transitions between
//! commands, and mirrors every change into the variable store so `${_status}`
//! reads stay consistent with try-block captures.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::registry::Service;

#[derive(Debug, Clone)]
struct ErrorState {
    status: String,
    message: String,
    last_status: String,
    last_message: String,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self {
            status: "0".to_string(),
            message: String::new(),
            last_status: "0".to_string(),
            last_message: String::new(),
        }
    }
}

/// The error-state service.
pub struct ErrorStateService {
    state: RwLock<ErrorState>,
}

impl ErrorStateService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ErrorState::default()),
        }
    }

    /// Resets the state on the boundary between two commands.
    ///
    /// The current values are snapshotted into the `last` pair first, so a
    /// try block's post-handler can still read the just-captured failure.
    pub fn reset(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            state.last_status = std::mem::take(&mut state.status);
            state.last_message = std::mem::take(&mut state.message);
            state.status = "0".to_string();
        }
        self.mirror()
    }

    /// Records a failure.
    pub fn set_error(&self, message: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            state.status = "1".to_string();
            state.message = message.to_string();
        }
        self.mirror()
    }

    /// Records a success.
    pub fn set_success(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            state.status = "0".to_string();
            state.message = String::new();
        }
        self.mirror()
    }

    /// Returns the current `(status, message)` pair.
    pub fn current(&self) -> (String, String) {
        let state = self.state.read();
        (state.status.clone(), state.message.clone())
    }

    /// Returns the snapshot taken at the last reset.
    pub fn last(&self) -> (String, String) {
        let state = self.state.read();
        (state.last_status.clone(), state.last_message.clone())
    }

    fn mirror(&self) -> Result<()> {
        let (status, message, last_status, last_message) = {
            let state = self.state.read();
            (
                state.status.clone(),
                state.message.clone(),
                state.last_status.clone(),
                state.last_message.clone(),
            )
        };
        let vars = crate::services::variable_service()?;
        vars.set_system_variable("_status", &status)?;
        vars.set_system_variable("_error", &message)?;
        vars.set_system_variable("#last_status", &last_status)?;
        vars.set_system_variable("#last_error", &last_message)?;
        Ok(())
    }
}

impl Default for ErrorStateService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ErrorStateService {
    fn name(&self) -> &str {
        "error-state"
    }

    fn initialize(&self) -> Result<()> {
        self.mirror()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
