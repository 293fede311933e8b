//! Run reporting
//!
//! The runner only pushes data into a [`Reporter`]; nothing flows back.

use colored::Colorize;

use super::{CaseResult, SessionResult, StepOutcome, StepReport};

/// Receives run progress
pub trait Reporter: Send {
    fn suite_started(&mut self, _name: &str, _description: Option<&str>) {}

    fn case_started(&mut self, _name: &str) {}

    fn step_finished(&mut self, report: &StepReport);

    fn case_finished(&mut self, _result: &CaseResult) {}

    fn session_finished(&mut self, _result: &SessionResult) {}
}

/// Prints colored progress to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn suite_started(&mut self, name: &str, description: Option<&str>) {
        println!("\n{} {}", "Running Suite:".blue().bold(), name.white().bold());
        if let Some(desc) = description {
            println!("  {}", desc.dimmed());
        }
    }

    fn case_started(&mut self, name: &str) {
        println!("\n{} {}", "Case:".cyan(), name);
    }

    fn step_finished(&mut self, report: &StepReport) {
        match report.outcome {
            StepOutcome::Passed => {
                // non-reportable steps are only shown when verbose
                if report.reported.is_some() || self.verbose {
                    println!("  {} {}", "✓".green(), report.line);
                }
            }
            StepOutcome::Failed => {
                println!("  {} {}", "✗".red(), report.line);
                for error in &report.errors {
                    println!("      {}", error.red());
                }
            }
            StepOutcome::Skipped => {
                println!("  {} {} {}", "-".yellow(), report.line.dimmed(), "(skipped)".yellow());
            }
            StepOutcome::Inactive => {
                if self.verbose {
                    println!("  {} {} {}", "·".dimmed(), report.line.dimmed(), "(inactive)".dimmed());
                }
            }
        }

        if self.verbose {
            for comment in &report.comments {
                println!("      {}", comment.dimmed());
            }
        }
    }

    fn case_finished(&mut self, result: &CaseResult) {
        if let Some(error) = &result.error {
            println!("  {} {}", "✗".red(), error);
            return;
        }

        let mut summary = format!("{}/{} steps run", result.steps_run, result.steps_total);
        if result.skipped > 0 {
            summary.push_str(&format!(", {} skipped", result.skipped));
        }
        if let Some(unit) = result.quit {
            summary.push_str(&format!(", quit {}", unit));
        }

        if result.passed {
            println!("  {} {} ({})", "✓".green().bold(), "Case Passed".green().bold(), summary);
        } else {
            println!("  {} {} ({})", "✗".red().bold(), "Case Failed".red().bold(), summary);
        }
    }

    fn session_finished(&mut self, result: &SessionResult) {
        let failed = result.failed_cases();
        let passed = result.cases.len() - failed;
        let not_run = result.cases_total - result.cases.len();

        println!();
        if result.quit_session {
            println!("{}", "Session stopped by post-step policy".yellow());
        }
        let mut line = format!("{} passed, {} failed", passed, failed);
        if not_run > 0 {
            line.push_str(&format!(", {} not run", not_run));
        }
        if failed == 0 {
            println!("{} {}\n", "✓".green().bold(), line.green().bold());
        } else {
            println!("{} {}\n", "✗".red().bold(), line.red().bold());
        }
    }
}

/// Collects reports in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    steps: Vec<StepReport>,
    cases: Vec<CaseResult>,
}

impl MemoryReporter {
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    pub fn cases(&self) -> &[CaseResult] {
        &self.cases
    }

    /// Rendered lines of every reported step
    pub fn lines(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.line.as_str()).collect()
    }
}

impl Reporter for MemoryReporter {
    fn step_finished(&mut self, report: &StepReport) {
        self.steps.push(report.clone());
    }

    fn case_finished(&mut self, result: &CaseResult) {
        self.cases.push(result.clone());
    }
}
