//! Command-line argument parsing for NeuroShell.

use clap::Parser;
use std::path::PathBuf;

/// An interactive, scriptable shell for orchestrating LLM conversations.
#[derive(Parser, Debug)]
#[command(name = "neuro")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script file to execute (.neuro)
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Execute a single command line and exit
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    pub command: Option<String>,

    /// Write logs to the state-directory log file instead of stderr
    #[arg(long)]
    pub log_file: bool,

    /// Skip ~/.neurorc at startup
    #[arg(long)]
    pub no_rc: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when neither a script nor a one-shot command was given.
    pub fn is_interactive(&self) -> bool {
        self.script.is_none() && self.command.is_none()
    }
}
