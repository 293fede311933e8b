//! Test steps
//!
//! A [`TestStep`] is built from one normalized source row. Its eight source
//! fields never change after construction; everything else (properties,
//! notes, events, saved values, policy) is derived state filled in by
//! [`TestStep::initialize`] and by dispatch.

pub mod data;
pub mod policy;
pub mod report;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::common::{is_affirmative, is_negative, Error, Result};
use crate::session::SessionContext;
use crate::source::SourceRow;

pub use data::{parse_data, DataMap};
pub use policy::{ActionEvent, PolicyEffect, PostStepPolicy, QuitUnit, StepStatus};

/// Data key carrying the post-step policy code
pub const POLICY_KEY: &str = "ptp";
/// Data key naming the variable a query result is saved under
pub const SAVE_AS_KEY: &str = "saveas";
/// Data key carrying the side parameter of `getattribute` / `getcssvalue`
pub const PARAM_KEY: &str = "param";

/// A timestamped comment or error entry
#[derive(Debug, Clone, Serialize)]
pub struct StepNote {
    pub message: String,
    #[serde(serialize_with = "serialize_time")]
    pub at: DateTime<Local>,
}

/// Kinds of entries in a step's event history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Init,
    Action,
    Query,
    Saved,
    Comment,
    Error,
    Finished,
}

/// One entry in a step's event history
#[derive(Debug, Clone, Serialize)]
pub struct StepEvent {
    pub kind: EventKind,
    pub detail: String,
    #[serde(serialize_with = "serialize_time")]
    pub at: DateTime<Local>,
}

fn serialize_time<S: serde::Serializer>(
    at: &DateTime<Local>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339())
}

/// One row of a test table, prepared for execution
#[derive(Debug, Clone)]
pub struct TestStep {
    id: String,
    action: String,
    locator_type: String,
    locator_spec: String,
    query_function: String,
    active: String,
    data: String,
    description: String,

    properties: BTreeMap<String, String>,
    comments: Vec<StepNote>,
    errors: Vec<StepNote>,
    events: Vec<StepEvent>,
    saved: BTreeMap<String, String>,
    policy: Option<PostStepPolicy>,
    exception: Option<String>,

    started: Option<Instant>,
    finished: Option<Instant>,
    started_at: Option<DateTime<Local>>,
    session_id: Option<String>,
    session_step: u32,
    reported_step: Option<u32>,
    initialized: bool,
}

impl TestStep {
    /// Create a step from a normalized row. Derived state starts empty.
    pub fn from_row(row: &SourceRow) -> Self {
        Self {
            id: row.id().to_string(),
            action: row.action().to_string(),
            locator_type: row.locator_type().to_string(),
            locator_spec: row.locator_spec().to_string(),
            query_function: row.query_function().to_string(),
            active: row.active().to_string(),
            data: row.data().to_string(),
            description: row.description().to_string(),
            properties: BTreeMap::new(),
            comments: Vec::new(),
            errors: Vec::new(),
            events: Vec::new(),
            saved: BTreeMap::new(),
            policy: None,
            exception: None,
            started: None,
            finished: None,
            started_at: None,
            session_id: None,
            session_step: 0,
            reported_step: None,
            initialized: false,
        }
    }

    /// Prepare the step for execution. Must run exactly once.
    ///
    /// In order: start the duration timer, substitute `${name}` tokens in all
    /// eight source fields, parse the data column, parse the `ptp` policy,
    /// attach the driver session if one is live, assign step numbers, and
    /// record an INIT event. Problems along the way become comments; only a
    /// second call is an error.
    pub fn initialize(&mut self, ctx: &mut SessionContext) -> Result<()> {
        if self.initialized {
            return Err(Error::StepAlreadyInitialized(self.id.clone()));
        }
        self.initialized = true;
        self.started = Some(Instant::now());
        self.started_at = Some(Local::now());

        let mut unresolved = Vec::new();
        for field in [
            &mut self.id,
            &mut self.action,
            &mut self.locator_type,
            &mut self.locator_spec,
            &mut self.query_function,
            &mut self.active,
            &mut self.data,
            &mut self.description,
        ] {
            let (value, missing) = ctx.variables.substitute(field.as_str());
            *field = value;
            unresolved.extend(missing);
        }
        if !unresolved.is_empty() {
            unresolved.sort();
            unresolved.dedup();
            tracing::debug!("Step '{}': unresolved variables {:?}", self.id, unresolved);
            self.add_comment(format!("Unresolved variables: {}", unresolved.join(", ")));
        }

        let parsed = parse_data(&self.data, ctx.settings.data_delimiter);
        for dropped in &parsed.dropped {
            tracing::warn!("Step '{}': dropping malformed data entry '{}'", self.id, dropped);
            self.add_comment(format!("Ignored malformed data entry '{}'", dropped));
        }
        self.properties = parsed.entries;

        if let Some(code) = self.properties.get(POLICY_KEY).cloned() {
            let policy = PostStepPolicy::parse(&code);
            if policy.is_valid() {
                tracing::debug!("Step '{}': policy {}", self.id, policy);
                self.policy = Some(policy);
            } else {
                tracing::warn!("Step '{}': ignoring policy '{}': {}", self.id, code, policy);
                self.add_comment(format!("Ignored post-step policy '{}' ({})", code, policy));
            }
        }

        self.session_id = ctx.driver().map(|d| d.session_id().to_string());

        let reportable = self.is_reportable(&ctx.settings.reportable_key);
        let (session_step, reported_step) = ctx.next_step_numbers(reportable);
        self.session_step = session_step;
        self.reported_step = reported_step;

        self.record_event(EventKind::Init, format!("step {} initialized", session_step));
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn locator_type(&self) -> &str {
        &self.locator_type
    }

    pub fn locator_spec(&self) -> &str {
        &self.locator_spec
    }

    pub fn query_function(&self) -> &str {
        &self.query_function
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Blank means active; otherwise only affirmative values are active
    pub fn is_active(&self) -> bool {
        self.active.trim().is_empty() || is_affirmative(&self.active)
    }

    /// Steps are reportable unless `key` is explicitly set to a negative value
    pub fn is_reportable(&self, key: &str) -> bool {
        !self.properties.get(key).is_some_and(|v| is_negative(v))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Lowercase-keyed properties parsed from the data column
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Variable name a query result should be saved under, if declared
    pub fn save_as(&self) -> Option<&str> {
        self.property(SAVE_AS_KEY).filter(|v| !v.trim().is_empty())
    }

    pub fn policy(&self) -> Option<&PostStepPolicy> {
        self.policy.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn session_step(&self) -> u32 {
        self.session_step
    }

    pub fn reported_step(&self) -> Option<u32> {
        self.reported_step
    }

    /// Append an error. Blank messages are ignored.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            return;
        }
        self.record_event(EventKind::Error, message.clone());
        self.errors.push(StepNote {
            message,
            at: Local::now(),
        });
    }

    /// Append a comment. Blank messages are ignored.
    pub fn add_comment(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            return;
        }
        self.record_event(EventKind::Comment, message.clone());
        self.comments.push(StepNote {
            message,
            at: Local::now(),
        });
    }

    /// Record an unexpected failure raised while executing the step
    pub fn set_exception(&mut self, error: &Error) {
        self.record_event(EventKind::Error, format!("exception: {}", error));
        self.exception = Some(error.to_string());
    }

    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }

    pub fn record_event(&mut self, kind: EventKind, detail: impl Into<String>) {
        self.events.push(StepEvent {
            kind,
            detail: detail.into(),
            at: Local::now(),
        });
    }

    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    pub fn errors(&self) -> &[StepNote] {
        &self.errors
    }

    pub fn comments(&self) -> &[StepNote] {
        &self.comments
    }

    /// Errors joined for display
    pub fn errors_text(&self) -> String {
        join_notes(&self.errors)
    }

    /// Comments joined for display
    pub fn comments_text(&self) -> String {
        join_notes(&self.comments)
    }

    /// Any recorded error makes the step a failure
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.exception.is_none()
    }

    pub fn status(&self) -> StepStatus {
        if self.is_valid() {
            StepStatus::Pass
        } else {
            StepStatus::Fail
        }
    }

    /// Store a query result on the step
    pub fn save_property(&mut self, name: &str, value: &str) {
        self.record_event(EventKind::Saved, format!("{} = {}", name, value));
        self.saved.insert(name.to_string(), value.to_string());
    }

    pub fn saved_properties(&self) -> &BTreeMap<String, String> {
        &self.saved
    }

    /// Stop the duration timer and record a FINISHED event
    pub fn finish(&mut self) {
        if self.finished.is_none() {
            self.finished = Some(Instant::now());
            let detail = format!("{} in {} ms", self.status(), self.duration().as_millis());
            self.record_event(EventKind::Finished, detail);
        }
    }

    /// Time since initialization, frozen once the step finishes
    pub fn duration(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    /// Render a report line from a `{token}` template
    ///
    /// Tokens: `step`, `reported`, `id`, `action`, `loctype`, `locspec`,
    /// `query`, `active`, `data`, `description`, `status`, `errors`,
    /// `comments`, `policy`, `duration`, `session`, and `data.<key>` for any
    /// parsed property.
    pub fn report_item_from_template(&self, template: &str) -> String {
        report::render_template(template, |token| self.report_value(token))
    }

    fn report_value(&self, token: &str) -> Option<String> {
        if let Some(key) = token.strip_prefix("data.") {
            return self.property(key).map(str::to_string);
        }
        let value = match token {
            "step" => self.session_step.to_string(),
            "reported" => self.reported_step.map(|n| n.to_string()).unwrap_or_default(),
            "id" => self.id.clone(),
            "action" => self.action.clone(),
            "loctype" => self.locator_type.clone(),
            "locspec" => self.locator_spec.clone(),
            "query" => self.query_function.clone(),
            "active" => self.active.clone(),
            "data" => self.data.clone(),
            "description" => self.description.clone(),
            "status" => self.status().to_string(),
            "errors" => self.errors_text(),
            "comments" => self.comments_text(),
            "policy" => self.policy.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            "duration" => format!("{} ms", self.duration().as_millis()),
            "session" => self.session_id.clone().unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}

fn join_notes(notes: &[StepNote]) -> String {
    notes
        .iter()
        .map(|n| n.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
