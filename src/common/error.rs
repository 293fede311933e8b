//! Error types for tablerun
//!
//! Errors are typed inside the crate. At the step boundary they are turned
//! into notes on the owning step, so a failing query or action never aborts
//! the rest of the run.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tablerun
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Source Errors ===
    #[error("Unsupported step source '{0}'. Supported: .xml, .html, .xls, .xlsx files or inline generators")]
    UnsupportedSource(String),

    #[error("Malformed source spec '{spec}': {reason}")]
    SourceSpec { spec: String, reason: String },

    #[error("Failed to parse step source '{source_name}': {reason}")]
    SourceParse { source_name: String, reason: String },

    // === Generator Errors ===
    #[error("Generator '{name}' not found{}", detail_suffix(.detail))]
    GeneratorNotFound { name: String, detail: Option<String> },

    #[error("Failed to fetch '{location}': {reason}")]
    ExternalFetch { location: String, reason: String },

    #[error("Invalid generator manifest '{name}': {reason}")]
    ManifestParse { name: String, reason: String },

    #[error("Generator '{name}' failed: {reason}")]
    GeneratorFailed { name: String, reason: String },

    // === Driver Errors ===
    #[error("No automation session active")]
    NoSession,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    #[error("Element not found using {strategy} '{value}'")]
    ElementNotFound { strategy: String, value: String },

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    // === Dispatch Errors ===
    #[error("Unsupported query function '{0}'")]
    UnsupportedQuery(String),

    #[error("Query '{function}' requires a parameter (data key '{key}')")]
    MissingParameter { function: String, key: String },

    #[error("Unsupported action '{0}'")]
    UnsupportedAction(String),

    // === Step Lifecycle Errors ===
    #[error("Step '{0}' was already initialized")]
    StepAlreadyInitialized(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl Error {
    /// Create a WebDriver command failure
    pub fn webdriver(command: &str, message: impl Into<String>) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Create a source parse failure
    pub fn source_parse(source_name: &str, reason: impl Into<String>) -> Self {
        Self::SourceParse {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-spec failure
    pub fn source_spec(spec: &str, reason: impl Into<String>) -> Self {
        Self::SourceSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a generator-not-found failure with an optional resolver detail
    pub fn generator_not_found(name: &str, detail: Option<String>) -> Self {
        Self::GeneratorNotFound {
            name: name.to_string(),
            detail,
        }
    }

    /// Create a fetch failure for an external location
    pub fn external_fetch(location: &str, reason: impl Into<String>) -> Self {
        Self::ExternalFetch {
            location: location.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_not_found_message() {
        let plain = Error::generator_not_found("acme.Login", None);
        assert_eq!(plain.to_string(), "Generator 'acme.Login' not found");

        let detailed =
            Error::generator_not_found("acme.Login", Some("connection refused".to_string()));
        assert_eq!(
            detailed.to_string(),
            "Generator 'acme.Login' not found: connection refused"
        );
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = Error::MissingParameter {
            function: "getattribute".to_string(),
            key: "param".to_string(),
        };
        assert!(err.to_string().contains("getattribute"));
        assert!(err.to_string().contains("'param'"));
    }
}
