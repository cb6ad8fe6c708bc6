//! NeuroShell - an interactive, scriptable shell for orchestrating LLM
//! conversations.

use neuroshell::cli::Cli;
use neuroshell::error::{NeuroError, Result};
use neuroshell::{logging, script, shell, Engine};
use tracing::error;

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only if it exists but can't be read
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Parse CLI early to determine mode
    let cli = Cli::parse_args();

    // Interactive mode logs to a file so the prompt stays clean; script and
    // one-shot modes log to stderr.
    if cli.is_interactive() || cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    shell::bootstrap()?;
    let engine = Engine::new();

    if !cli.no_rc {
        shell::run_neurorc(&engine).await;
    }

    if let Some(line) = &cli.command {
        return match engine.execute(line).await {
            Err(NeuroError::Exit) => Ok(()),
            result => result,
        };
    }

    if let Some(path) = &cli.script {
        return script::run_script(&engine, path).await;
    }

    shell::repl(&engine).await
}
