//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Step source loading
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Step construction and reporting
    #[serde(default)]
    pub steps: StepConfig,

    /// WebDriver endpoint
    #[serde(default)]
    pub webdriver: WebDriverConfig,
}

/// Step source loading settings
#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    /// Base folder that relative file sources are resolved against
    #[serde(default = "default_data_folder")]
    pub data_folder: PathBuf,

    /// Folder or http(s) base URL holding external generator manifests
    #[serde(default = "default_load_folder")]
    pub load_folder: String,

    /// Generator names eligible for external resolution
    #[serde(default)]
    pub external: Vec<String>,

    /// Upper bound on the size of a fetched manifest
    #[serde(default = "default_max_fetch_bytes")]
    pub max_fetch_bytes: usize,

    /// Upper bound on the rows a generator may produce
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_folder: default_data_folder(),
            load_folder: default_load_folder(),
            external: Vec::new(),
            max_fetch_bytes: default_max_fetch_bytes(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_data_folder() -> PathBuf {
    PathBuf::from(".")
}

fn default_load_folder() -> String {
    "generators".to_string()
}

fn default_max_fetch_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_max_rows() -> usize {
    100_000
}

/// Step construction and report settings
#[derive(Debug, Deserialize, Clone)]
pub struct StepConfig {
    /// Separator between `key=value` pairs in the data column
    #[serde(default = "default_data_delimiter")]
    pub data_delimiter: char,

    /// Template for the per-step report line
    #[serde(default = "default_report_template")]
    pub report_template: String,

    /// Data key that marks a step as non-reportable when set to no/false
    #[serde(default = "default_reportable_key")]
    pub reportable_key: String,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            data_delimiter: default_data_delimiter(),
            report_template: default_report_template(),
            reportable_key: default_reportable_key(),
        }
    }
}

fn default_data_delimiter() -> char {
    ','
}

fn default_report_template() -> String {
    "{step}. {id} - {description} - {action} {query}".to_string()
}

fn default_reportable_key() -> String {
    "report".to_string()
}

/// WebDriver settings
#[derive(Debug, Deserialize, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server
    #[serde(default = "default_webdriver_url")]
    pub url: String,

    /// Browser name requested in the new-session capabilities
    #[serde(default = "default_browser")]
    pub browser: String,

    /// Timeout for a single WebDriver HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            browser: default_browser(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_browser() -> String {
    "firefox".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
