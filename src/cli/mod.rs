//! CLI command handling
//!
//! Runs CLI commands against the library and formats output.

use colored::Colorize;
use std::path::PathBuf;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::driver::{Driver, WebDriverClient};
use crate::runner::{ConsoleReporter, Runner, Suite};
use crate::source::{SourceLoader, SourceSpec, StepTable, COLUMNS};
use crate::step::{PostStepPolicy, StepStatus};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but its outcome is a failure
/// (a failed case, an invalid policy code).
pub async fn dispatch(command: Commands, config: Config) -> Result<bool> {
    match command {
        Commands::Run {
            suite,
            webdriver,
            no_driver,
            verbose,
        } => run_suite(config, suite, webdriver, no_driver, verbose).await,

        Commands::Load {
            spec,
            data_folder,
            json,
        } => {
            let spec = SourceSpec::parse(&spec)?;
            let mut loader = SourceLoader::new(&config.loader);
            if let Some(folder) = data_folder {
                loader.set_data_folder(folder);
            }
            let table = loader.try_load(&spec).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&table_json(&table))?);
            } else if table.is_empty() {
                println!("No steps in {}", spec);
            } else {
                print_table(&table);
            }
            Ok(true)
        }

        Commands::Policy { code } => {
            let policy = PostStepPolicy::parse(&code);
            println!("Code:    {}", policy.code());
            println!("Policy:  {}", policy);
            if !policy.is_valid() {
                return Ok(false);
            }
            for status in [StepStatus::Pass, StepStatus::Fail] {
                println!("On {}: {}", status, effect_on(&policy, status));
            }
            Ok(true)
        }

        Commands::Generators { json } => {
            let loader = SourceLoader::new(&config.loader);
            let builtin: Vec<_> = loader.registry().entries().collect();
            let external: Vec<_> = loader.external().allowlist().collect();

            if json {
                let output = serde_json::json!({
                    "registered": builtin
                        .iter()
                        .map(|e| serde_json::json!({ "name": e.name, "description": e.description }))
                        .collect::<Vec<_>>(),
                    "external": {
                        "load_folder": loader.external().load_folder(),
                        "names": external,
                    },
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(true);
            }

            println!("Registered generators:");
            for entry in &builtin {
                println!("  {:<20} {}", entry.name, entry.description.dimmed());
            }
            println!();
            println!("External generators (from {}):", loader.external().load_folder());
            if external.is_empty() {
                println!("  {}", "(none allowlisted)".dimmed());
            }
            for name in external {
                println!("  {}", name);
            }
            Ok(true)
        }
    }
}

async fn run_suite(
    mut config: Config,
    path: PathBuf,
    webdriver: Option<String>,
    no_driver: bool,
    verbose: bool,
) -> Result<bool> {
    let suite = Suite::load(&path)?;
    if let Some(url) = webdriver {
        config.webdriver.url = url;
    }

    let mut runner = Runner::new(&config, ConsoleReporter::new(verbose));
    if !no_driver {
        let client = WebDriverClient::connect(&config.webdriver).await?;
        println!("WebDriver session: {}", client.session_id().dimmed());
        runner.context_mut().attach_driver(Box::new(client));
    }

    let result = runner.run_suite(&suite).await;

    if let Some(driver) = runner.context_mut().detach_driver() {
        if let Err(e) = driver.quit().await {
            tracing::warn!("Failed to close WebDriver session: {}", e);
        }
    }

    Ok(result.passed())
}

fn effect_on(policy: &PostStepPolicy, status: StepStatus) -> String {
    if policy.should_quit_session(status) {
        "quit TEST_SESSION".to_string()
    } else if policy.should_quit_case(status) {
        "quit TEST_CASE".to_string()
    } else {
        match policy.steps_to_skip(status) {
            0 => "continue".to_string(),
            n => format!("skip {} steps", n),
        }
    }
}

fn table_json(table: &StepTable) -> Vec<serde_json::Map<String, serde_json::Value>> {
    table
        .iter()
        .map(|row| {
            COLUMNS
                .iter()
                .zip(row.cells())
                .map(|(column, cell)| (column.to_string(), serde_json::Value::from(cell.as_str())))
                .collect()
        })
        .collect()
}

fn print_table(table: &StepTable) {
    let mut widths: Vec<usize> = COLUMNS.iter().map(|c| c.len()).collect();
    for row in table {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(COLUMNS.to_vec()).bold());
    for row in table {
        println!("{}", render(row.cells().iter().map(String::as_str).collect()));
    }
    println!("\n{} rows", table.len());
}
