//! CLI command definitions
//!
//! Defines the clap commands for the tablerun CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a YAML test suite
    Run {
        /// Path to the YAML suite file
        suite: PathBuf,

        /// WebDriver server URL (overrides the config file)
        #[arg(long)]
        webdriver: Option<String>,

        /// Run without opening a WebDriver session
        #[arg(long)]
        no_driver: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// Load a step source and print its normalized table
    Load {
        /// Source spec, e.g. `file,steps.xlsx,Sheet1` or `inline,builtin.rows,"A|open"`
        spec: String,

        /// Folder file sources resolve against (overrides the config file)
        #[arg(long)]
        data_folder: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a post-step policy code and show its effect
    Policy {
        /// Policy code, e.g. `SOF3` or `QTOF`
        code: String,
    },

    /// List registered and externally resolvable generators
    Generators {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
