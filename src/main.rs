//! tablerun - data-driven test orchestration
//!
//! Turns tabular step definitions into executable test steps, dispatches
//! their actions and queries against a WebDriver session, and obeys each
//! step's post-step policy.

use clap::Parser;
use std::path::PathBuf;
use tablerun::common::{config::Config, logging, paths};
use tablerun::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "tablerun", about = "Data-driven test step runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Suite runs also log to a file; the guard flushes it on exit
    let _guard = match &cli.command {
        Commands::Run { verbose, .. } => match paths::log_dir() {
            Some(dir) => match logging::init_with_file(&dir, *verbose) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    logging::init_cli(*verbose);
                    tracing::warn!("File logging disabled: {}", e);
                    None
                }
            },
            None => {
                logging::init_cli(*verbose);
                None
            }
        },
        _ => {
            logging::init_cli(false);
            None
        }
    };

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
