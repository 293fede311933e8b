//! Suite execution
//!
//! Cases run in order; within a case each row becomes a [`TestStep`] only
//! when its turn comes, so a step always sees the variables saved by the
//! steps before it. After every executed step the step's post-step policy
//! decides whether to skip rows or stop the case or the whole session.

pub mod report;
pub mod suite;

use async_trait::async_trait;
use serde::Serialize;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::query;
use crate::session::SessionContext;
use crate::source::{SourceLoader, SourceRow, SourceSpec, StepTable};
use crate::step::{EventKind, QuitUnit, StepStatus, TestStep};

pub use report::{ConsoleReporter, MemoryReporter, Reporter};
pub use suite::{CaseSpec, Suite};

/// How a row ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed,
    /// Not executed because an earlier step's policy skipped it
    Skipped,
    /// Executed nothing because the step's `active` cell was negative
    Inactive,
}

/// What a reporter receives for each row
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub id: String,
    /// Line rendered from the report template
    pub line: String,
    pub outcome: StepOutcome,
    /// Session step number; `None` for rows that were never constructed
    pub step: Option<u32>,
    /// Reported step number; `None` for non-reportable or skipped rows
    pub reported: Option<u32>,
    pub errors: Vec<String>,
    pub comments: Vec<String>,
}

impl StepReport {
    fn from_step(step: &TestStep, outcome: StepOutcome, template: &str) -> Self {
        Self {
            id: step.id().to_string(),
            line: step.report_item_from_template(template),
            outcome,
            step: Some(step.session_step()),
            reported: step.reported_step(),
            errors: step.errors().iter().map(|n| n.message.clone()).collect(),
            comments: step.comments().iter().map(|n| n.message.clone()).collect(),
        }
    }

    fn skipped(row: &SourceRow) -> Self {
        let line = [row.id(), row.description()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" - ");
        Self {
            id: row.id().to_string(),
            line,
            outcome: StepOutcome::Skipped,
            step: None,
            reported: None,
            errors: Vec::new(),
            comments: Vec::new(),
        }
    }
}

/// Result of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub skipped: usize,
    /// Unit a quitting policy stopped, if any
    pub quit: Option<QuitUnit>,
    /// Why the case could not run
    pub error: Option<String>,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub name: String,
    pub cases: Vec<CaseResult>,
    /// Cases in the suite, including ones a session quit left unrun
    pub cases_total: usize,
    pub quit_session: bool,
}

impl SessionResult {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn failed_cases(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed).count()
    }
}

/// Performs step actions beyond the built-in ones
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn perform(&self, step: &mut TestStep, ctx: &mut SessionContext) -> Result<()>;
}

/// Default handler: every non-built-in action is unsupported
pub struct UnsupportedActions;

#[async_trait]
impl ActionHandler for UnsupportedActions {
    async fn perform(&self, step: &mut TestStep, _ctx: &mut SessionContext) -> Result<()> {
        Err(Error::UnsupportedAction(step.action().to_string()))
    }
}

/// `setvar`: `data[name] = data[value]`
fn set_variable(step: &mut TestStep, ctx: &mut SessionContext) -> Result<()> {
    let name = step
        .property("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingParameter {
            function: "setvar".to_string(),
            key: "name".to_string(),
        })?;
    let value = step.property("value").unwrap_or_default().to_string();
    tracing::debug!("Step '{}': {} = {}", step.id(), name, value);
    ctx.variables.set(name, value);
    Ok(())
}

/// Post-step control decision
enum Flow {
    Continue,
    Skip(u32),
    Quit(QuitUnit),
}

/// Executes suites against one session context
pub struct Runner<R: Reporter> {
    ctx: SessionContext,
    loader: SourceLoader,
    actions: Box<dyn ActionHandler>,
    reporter: R,
}

impl<R: Reporter> Runner<R> {
    pub fn new(config: &Config, reporter: R) -> Self {
        Self {
            ctx: SessionContext::new(config.steps.clone()),
            loader: SourceLoader::new(&config.loader),
            actions: Box::new(UnsupportedActions),
            reporter,
        }
    }

    /// Replace the handler for non-built-in actions
    pub fn with_action_handler(mut self, handler: Box<dyn ActionHandler>) -> Self {
        self.actions = handler;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    pub fn loader_mut(&mut self) -> &mut SourceLoader {
        &mut self.loader
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Run every case of `suite` in order
    pub async fn run_suite(&mut self, suite: &Suite) -> SessionResult {
        if let Some(folder) = &suite.data_folder {
            self.loader.set_data_folder(folder.clone());
        }
        for (name, value) in suite.variables() {
            self.ctx.variables.set(name, value);
        }

        self.reporter
            .suite_started(&suite.name, suite.description.as_deref());
        tracing::info!("Running suite '{}' ({} cases)", suite.name, suite.cases.len());

        let mut result = SessionResult {
            name: suite.name.clone(),
            cases: Vec::new(),
            cases_total: suite.cases.len(),
            quit_session: false,
        };

        for case in &suite.cases {
            let case_result = self.run_case_spec(case).await;
            let quit_session = case_result.quit == Some(QuitUnit::TestSession);
            result.cases.push(case_result);
            if quit_session {
                tracing::info!("Session stopped by post-step policy in case '{}'", case.name);
                result.quit_session = true;
                break;
            }
        }

        self.reporter.session_finished(&result);
        result
    }

    async fn run_case_spec(&mut self, case: &CaseSpec) -> CaseResult {
        let loaded = match SourceSpec::parse(&case.source) {
            Ok(spec) => self.loader.try_load(&spec).await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(table) if !table.is_empty() => self.run_case(&case.name, &table).await,
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    Ok(_) => format!("no steps loaded from '{}'", case.source),
                };
                tracing::warn!("Case '{}' not run: {}", case.name, reason);
                self.reporter.case_started(&case.name);
                let result = CaseResult {
                    name: case.name.clone(),
                    passed: false,
                    steps_run: 0,
                    steps_total: 0,
                    skipped: 0,
                    quit: None,
                    error: Some(reason),
                };
                self.reporter.case_finished(&result);
                result
            }
        }
    }

    /// Run one loaded table as a case
    pub async fn run_case(&mut self, name: &str, table: &StepTable) -> CaseResult {
        self.reporter.case_started(name);

        let mut result = CaseResult {
            name: name.to_string(),
            passed: true,
            steps_run: 0,
            steps_total: table.len(),
            skipped: 0,
            quit: None,
            error: None,
        };

        let mut rows = table.iter();
        while let Some(row) = rows.next() {
            let (report, flow) = self.run_row(row).await;
            match report.outcome {
                StepOutcome::Passed => result.steps_run += 1,
                StepOutcome::Failed => {
                    result.steps_run += 1;
                    result.passed = false;
                }
                StepOutcome::Skipped | StepOutcome::Inactive => {}
            }
            self.reporter.step_finished(&report);

            match flow {
                Flow::Continue => {}
                Flow::Skip(count) => {
                    for skipped in rows.by_ref().take(count as usize) {
                        result.skipped += 1;
                        self.reporter.step_finished(&StepReport::skipped(skipped));
                    }
                }
                Flow::Quit(unit) => {
                    tracing::info!("Case '{}' stopped: quit {}", name, unit);
                    result.quit = Some(unit);
                    break;
                }
            }
        }

        self.reporter.case_finished(&result);
        result
    }

    async fn run_row(&mut self, row: &SourceRow) -> (StepReport, Flow) {
        let template = self.ctx.settings.report_template.clone();
        let mut step = TestStep::from_row(row);

        if let Err(e) = step.initialize(&mut self.ctx) {
            step.set_exception(&e);
        }

        if !step.is_active() {
            tracing::debug!("Step '{}' inactive", step.id());
            step.finish();
            return (
                StepReport::from_step(&step, StepOutcome::Inactive, &template),
                Flow::Continue,
            );
        }

        self.perform_action(&mut step).await;
        if !step.query_function().trim().is_empty() {
            query::query(&mut step, &mut self.ctx).await;
        }
        step.finish();

        let status = step.status();
        let outcome = match status {
            StepStatus::Pass => StepOutcome::Passed,
            StepStatus::Fail => StepOutcome::Failed,
        };
        tracing::debug!(
            "Step {} '{}' {} in {} ms",
            step.session_step(),
            step.id(),
            status,
            step.duration().as_millis()
        );

        let flow = match step.policy() {
            Some(policy) if policy.should_quit_session(status) => Flow::Quit(QuitUnit::TestSession),
            Some(policy) if policy.should_quit_case(status) => Flow::Quit(QuitUnit::TestCase),
            Some(policy) => match policy.steps_to_skip(status) {
                0 => Flow::Continue,
                n => Flow::Skip(n),
            },
            None => Flow::Continue,
        };

        (StepReport::from_step(&step, outcome, &template), flow)
    }

    async fn perform_action(&mut self, step: &mut TestStep) {
        let action = step.action().trim().to_ascii_lowercase();
        let result = match action.as_str() {
            "" | "query" | "comment" => Ok(()),
            "setvar" => set_variable(step, &mut self.ctx),
            _ => self.actions.perform(step, &mut self.ctx).await,
        };

        match result {
            Ok(()) => {
                if !action.is_empty() {
                    step.record_event(EventKind::Action, action);
                }
            }
            Err(e @ (Error::Io(_) | Error::Internal(_))) => {
                tracing::error!("Step '{}': action '{}' raised: {}", step.id(), action, e);
                step.set_exception(&e);
            }
            Err(e) => {
                tracing::warn!("Step '{}': action '{}' failed: {}", step.id(), action, e);
                step.add_error(e.to_string());
            }
        }
    }
}
