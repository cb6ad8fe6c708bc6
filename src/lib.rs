//! NeuroShell - an interactive, scriptable shell for orchestrating LLM
//! conversations alongside ordinary commands.
//!
//! This library exposes the execution core for the `neuro` binary and for
//! integration tests: the engine, the command/service registries, the
//! variable substrate, and the LLM orchestration layer.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod logging;
pub mod registry;
pub mod script;
pub mod services;
pub mod shell;

pub use engine::Engine;
pub use error::{NeuroError, Result};
