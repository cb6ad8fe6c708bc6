//! `.neuro` script execution.
//!
//! Lines run top-to-bottom. `%%` marks a comment, `%%>` the engine's own
//! echo record (ignored on replay), blank lines are skipped, everything else
//! is a command. The engine itself turns non-backslash lines into `\send`.

use std::path::Path;

use crate::engine::Engine;
use crate::error::{NeuroError, Result};

/// Classification of one script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine<'a> {
    /// `%%` comment — ignored.
    Comment,
    /// `%%>` echo record from a previous run — ignored on replay.
    EchoRecord,
    /// Empty or whitespace-only line.
    Blank,
    /// A command (or free text) to execute.
    Command(&'a str),
}

/// Classifies one script line.
pub fn classify_line(line: &str) -> ScriptLine<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ScriptLine::Blank;
    }
    // The echo-record check comes first: `%%>` also starts with `%%`.
    if trimmed.starts_with("%%>") {
        return ScriptLine::EchoRecord;
    }
    if trimmed.starts_with("%%") {
        return ScriptLine::Comment;
    }
    ScriptLine::Command(trimmed)
}

/// Executes an iterator of lines, stopping cleanly at the exit sentinel and
/// aborting on the first unrecovered error.
pub async fn run_lines<'a, I>(engine: &Engine, lines: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for line in lines {
        let ScriptLine::Command(command) = classify_line(line) else {
            continue;
        };
        match engine.execute(command).await {
            Ok(()) => {}
            Err(NeuroError::Exit) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Executes a `.neuro` script file.
pub async fn run_script(engine: &Engine, path: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        NeuroError::execution(format!("cannot read script {}: {}", path.display(), e))
    })?;
    tracing::info!(script = %path.display(), "Running script");
    run_lines(engine, contents.lines()).await
}
