//! tablerun - data-driven test orchestration
//!
//! This library loads tabular step definitions (XML, HTML, spreadsheets, or
//! in-process generators), turns each row into a [`TestStep`], dispatches
//! queries against a pluggable automation driver, and applies per-step
//! post-step policies that skip rows or stop a case or session.

pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod query;
pub mod runner;
pub mod session;
pub mod source;
pub mod step;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use runner::{Runner, Suite};
pub use session::SessionContext;
pub use source::{SourceLoader, SourceSpec, StepTable};
pub use step::{PostStepPolicy, TestStep};
