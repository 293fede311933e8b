//! Post-step control-flow policies
//!
//! A policy is a short code carried in a step's `ptp` data key. It is
//! evaluated once after the step runs and tells the runner to skip the next
//! N steps or to quit the current test case or session.
//!
//! | Code          | Effect                          |
//! |---------------|---------------------------------|
//! | `QSU`         | quit session, any result        |
//! | `QTU`         | quit case, any result           |
//! | `QTOP`/`QTOF` | quit case on pass / on fail     |
//! | `QSOP`/`QSOF` | quit session on pass / on fail  |
//! | `SOF<n>`      | skip n steps on fail            |
//! | `SOP<n>`      | skip n steps on pass            |
//! | `SUN<n>`      | skip n steps, any result        |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Result of an executed step as seen by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pass => write!(f, "PASS"),
            StepStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" | "PASSED" => Ok(StepStatus::Pass),
            "FAIL" | "FAILED" => Ok(StepStatus::Fail),
            other => Err(format!("unknown step status '{}'", other)),
        }
    }
}

/// Which step result triggers the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionEvent {
    Pass,
    Fail,
    Any,
}

impl ActionEvent {
    fn matches(self, status: StepStatus) -> bool {
        match self {
            ActionEvent::Any => true,
            ActionEvent::Pass => status == StepStatus::Pass,
            ActionEvent::Fail => status == StepStatus::Fail,
        }
    }
}

impl fmt::Display for ActionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionEvent::Pass => write!(f, "PASS"),
            ActionEvent::Fail => write!(f, "FAIL"),
            ActionEvent::Any => write!(f, "ANY"),
        }
    }
}

/// Scope terminated by a quitting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuitUnit {
    TestCase,
    TestSession,
}

impl fmt::Display for QuitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuitUnit::TestCase => write!(f, "TEST_CASE"),
            QuitUnit::TestSession => write!(f, "TEST_SESSION"),
        }
    }
}

/// What a valid policy does once triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyEffect {
    Quit { unit: QuitUnit },
    Skip { steps: u32 },
}

/// A parsed post-step policy
///
/// Parsing never fails. An unparseable code yields an instance that carries
/// its errors, reports `is_valid() == false`, and has no effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostStepPolicy {
    code: String,
    event: ActionEvent,
    effect: Option<PolicyEffect>,
    errors: Vec<String>,
}

/// Quit codes, longest first so that `QTOP` wins over a 3-char lookalike
const QUIT_CODES: &[(&str, QuitUnit, ActionEvent)] = &[
    ("QTOP", QuitUnit::TestCase, ActionEvent::Pass),
    ("QTOF", QuitUnit::TestCase, ActionEvent::Fail),
    ("QSOP", QuitUnit::TestSession, ActionEvent::Pass),
    ("QSOF", QuitUnit::TestSession, ActionEvent::Fail),
    ("QSU", QuitUnit::TestSession, ActionEvent::Any),
    ("QTU", QuitUnit::TestCase, ActionEvent::Any),
];

const SKIP_CODES: &[(&str, ActionEvent)] = &[
    ("SOF", ActionEvent::Fail),
    ("SOP", ActionEvent::Pass),
    ("SUN", ActionEvent::Any),
];

impl PostStepPolicy {
    /// Parse a policy code. Case-insensitive, surrounding whitespace ignored.
    pub fn parse(code: &str) -> Self {
        let mut policy = Self {
            code: code.to_string(),
            event: ActionEvent::Any,
            effect: None,
            errors: Vec::new(),
        };

        let normalized = code.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            policy.errors.push("policy code is blank".to_string());
            return policy;
        }
        if normalized.len() < 3 {
            policy
                .errors
                .push(format!("policy code '{}' is shorter than 3 characters", code.trim()));
            return policy;
        }

        if normalized.starts_with('Q') {
            match QUIT_CODES
                .iter()
                .find(|(prefix, _, _)| normalized.starts_with(prefix))
            {
                Some((_, unit, event)) => {
                    policy.event = *event;
                    policy.effect = Some(PolicyEffect::Quit { unit: *unit });
                }
                None => policy
                    .errors
                    .push(format!("unknown quit policy '{}'", code.trim())),
            }
        } else if normalized.starts_with('S') {
            match SKIP_CODES
                .iter()
                .find(|(prefix, _)| normalized.starts_with(prefix))
            {
                Some((prefix, event)) => {
                    let count = normalized[prefix.len()..].trim();
                    match count.parse::<i64>() {
                        Ok(n) if n > 0 && n <= u32::MAX as i64 => {
                            policy.event = *event;
                            policy.effect = Some(PolicyEffect::Skip { steps: n as u32 });
                        }
                        Ok(n) => policy.errors.push(format!(
                            "skip count must be a positive integer, got {}",
                            n
                        )),
                        Err(_) if count.is_empty() => policy
                            .errors
                            .push(format!("skip policy '{}' is missing a step count", code.trim())),
                        Err(_) => policy
                            .errors
                            .push(format!("skip count '{}' is not a number", count)),
                    }
                }
                None => policy
                    .errors
                    .push(format!("unknown skip policy '{}'", code.trim())),
            }
        } else {
            policy.errors.push(format!(
                "policy code '{}' must start with Q (quit) or S (skip)",
                code.trim()
            ));
        }

        policy
    }

    /// The code this policy was parsed from
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.effect.is_some()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn event(&self) -> ActionEvent {
        self.event
    }

    /// The configured effect, `None` for invalid policies
    pub fn effect(&self) -> Option<PolicyEffect> {
        if self.is_valid() {
            self.effect
        } else {
            None
        }
    }

    pub fn is_quitter(&self) -> bool {
        matches!(self.effect(), Some(PolicyEffect::Quit { .. }))
    }

    pub fn is_skipper(&self) -> bool {
        matches!(self.effect(), Some(PolicyEffect::Skip { .. }))
    }

    /// Unit a quitting policy terminates
    pub fn unit(&self) -> Option<QuitUnit> {
        match self.effect() {
            Some(PolicyEffect::Quit { unit }) => Some(unit),
            _ => None,
        }
    }

    fn should_quit(&self, unit: QuitUnit, status: StepStatus) -> bool {
        self.unit() == Some(unit) && self.event.matches(status)
    }

    pub fn should_quit_session(&self, status: StepStatus) -> bool {
        self.should_quit(QuitUnit::TestSession, status)
    }

    pub fn should_quit_case(&self, status: StepStatus) -> bool {
        self.should_quit(QuitUnit::TestCase, status)
    }

    /// Number of following steps to skip for `status`, 0 when not triggered
    pub fn steps_to_skip(&self, status: StepStatus) -> u32 {
        match self.effect() {
            Some(PolicyEffect::Skip { steps }) if self.event.matches(status) => steps,
            _ => 0,
        }
    }

    /// Human-readable description of the policy
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PostStepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let condition = match self.event {
            ActionEvent::Any => "Un-conditionally".to_string(),
            event => format!("on {}", event),
        };
        match self.effect() {
            Some(PolicyEffect::Quit { unit }) => write!(f, "Quit {} {}", unit, condition),
            Some(PolicyEffect::Skip { steps }) => write!(f, "Skip {} steps {}", steps, condition),
            None => write!(f, "Invalid: {}", self.errors.join(", ")),
        }
    }
}
