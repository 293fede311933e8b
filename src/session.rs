//! Session context threaded through step construction and dispatch
//!
//! Holds the automation driver (when one is attached), the session-scoped
//! variable store, and step counters. Exactly one step borrows the context
//! mutably at a time; the runner hands it to each step in turn.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::common::config::StepConfig;
use crate::driver::Driver;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid")
});

/// Session-scoped `name -> value` mapping used for `${name}` substitution
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    vars: BTreeMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Replace every `${name}` in `template` with its value
    ///
    /// Unknown names are left in place and returned alongside the result.
    pub fn substitute(&self, template: &str) -> (String, Vec<String>) {
        let mut unresolved = Vec::new();
        let result = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match self.get(name) {
                Some(value) => value.to_string(),
                None => {
                    unresolved.push(name.to_string());
                    caps[0].to_string()
                }
            }
        });
        (result.into_owned(), unresolved)
    }
}

/// Everything a step needs from the running session
pub struct SessionContext {
    pub variables: VariableStore,
    pub settings: StepConfig,
    driver: Option<Box<dyn Driver>>,
    steps_started: u32,
    steps_reported: u32,
}

impl SessionContext {
    pub fn new(settings: StepConfig) -> Self {
        Self {
            variables: VariableStore::new(),
            settings,
            driver: None,
            steps_started: 0,
            steps_reported: 0,
        }
    }

    /// Attach a live automation session, returning the previous one
    pub fn attach_driver(&mut self, driver: Box<dyn Driver>) -> Option<Box<dyn Driver>> {
        tracing::debug!("Attaching driver session {}", driver.session_id());
        self.driver.replace(driver)
    }

    pub fn detach_driver(&mut self) -> Option<Box<dyn Driver>> {
        self.driver.take()
    }

    pub fn driver(&self) -> Option<&dyn Driver> {
        self.driver.as_deref()
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Assign the next session step number and, for reportable steps, the
    /// next reported number
    pub fn next_step_numbers(&mut self, reportable: bool) -> (u32, Option<u32>) {
        self.steps_started += 1;
        let reported = if reportable {
            self.steps_reported += 1;
            Some(self.steps_reported)
        } else {
            None
        };
        (self.steps_started, reported)
    }

    pub fn steps_started(&self) -> u32 {
        self.steps_started
    }

    pub fn steps_reported(&self) -> u32 {
        self.steps_reported
    }
}
