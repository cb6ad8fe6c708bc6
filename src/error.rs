//! Error types for NeuroShell.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for NeuroShell operations.
#[derive(Error, Debug)]
pub enum NeuroError {
    /// Read of a variable that is neither stored, computed, nor a history view.
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// User write to a `#`/`@` name or a `_` name outside the whitelist.
    #[error("Invalid variable: {0}")]
    InvalidVariable(String),

    /// A global service was requested before registration or initialization.
    #[error("Service not available: {0}")]
    ServiceNotAvailable(String),

    /// Two commands registered under the same name.
    #[error("Duplicate command: {0}")]
    DuplicateCommand(String),

    /// Two services registered under the same name.
    #[error("Duplicate service: {0}")]
    DuplicateService(String),

    /// Malformed command line (unclosed bracket block, bad option syntax, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Command-specific required-argument violation. Message starts with "Usage:".
    #[error("{0}")]
    Usage(String),

    /// Wrapped subprocess, I/O, or other execution failure.
    #[error("Execution error: {0}")]
    Execution(String),

    /// LLM API errors (auth, rate limits, timeouts, malformed responses).
    #[error("LLM error: {0}")]
    Llm(String),

    /// The engine saw more stack iterations than the hard limit allows.
    #[error("Infinite loop detected: command stack exceeded {0} iterations")]
    InfiniteLoop(usize),

    /// Cooperative shutdown sentinel returned by `quit`/`exit`. Recognized by
    /// the REPL and script hosts; never surfaced as a real failure.
    #[error("exit requested")]
    Exit,
}

impl NeuroError {
    /// Creates a variable-not-found error for the given name.
    pub fn variable_not_found(name: impl Into<String>) -> Self {
        Self::VariableNotFound(name.into())
    }

    /// Creates an invalid-variable error with the given message.
    pub fn invalid_variable(msg: impl Into<String>) -> Self {
        Self::InvalidVariable(msg.into())
    }

    /// Creates a service-not-available error for the given service name.
    pub fn service_not_available(name: impl Into<String>) -> Self {
        Self::ServiceNotAvailable(name.into())
    }

    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a usage error. The message is prefixed with "Usage: ".
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(format!("Usage: {}", msg.into()))
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::VariableNotFound(_) => "Variable Error",
            Self::InvalidVariable(_) => "Variable Error",
            Self::ServiceNotAvailable(_) => "Service Error",
            Self::DuplicateCommand(_) => "Registration Error",
            Self::DuplicateService(_) => "Registration Error",
            Self::Parse(_) => "Parse Error",
            Self::Usage(_) => "Usage Error",
            Self::Execution(_) => "Execution Error",
            Self::Llm(_) => "LLM Error",
            Self::InfiniteLoop(_) => "Engine Error",
            Self::Exit => "Exit",
        }
    }

    /// Returns true for engine-level fatals that try blocks must not capture.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InfiniteLoop(_) | Self::DuplicateCommand(_) | Self::DuplicateService(_)
        )
    }
}

/// Result type alias using NeuroError.
pub type Result<T> = std::result::Result<T, NeuroError>;
