//! Test suite definitions
//!
//! A suite is a YAML document naming the cases to run and the source each
//! case's step table comes from:
//!
//! ```yaml
//! name: Login smoke
//! description: Sign in and check the landing page
//! data_folder: tables
//! variables:
//!   user: alice
//! cases:
//!   - name: sign in
//!     source: file,login.xlsx,Smoke
//!   - name: generated checks
//!     source: inline,builtin.repeat,3,"C{n}|query||||yes||Check {n}"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::source::external::yaml_text;

/// A complete suite loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct Suite {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite verifies
    pub description: Option<String>,
    /// Folder file sources resolve against, relative to the suite file
    pub data_folder: Option<PathBuf>,
    /// Variables seeded into the session before the first case
    #[serde(default)]
    variables: BTreeMap<String, serde_yaml::Value>,
    /// Cases in execution order
    pub cases: Vec<CaseSpec>,
}

/// One case of a suite
#[derive(Deserialize, Debug, Clone)]
pub struct CaseSpec {
    pub name: String,
    /// Textual source spec (`file,...` or `inline,...`)
    pub source: String,
}

impl Suite {
    /// Read a suite file; a relative `data_folder` is resolved against the
    /// file's directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let mut suite = Self::parse(&content)?;

        let suite_dir = path.parent().unwrap_or(Path::new("."));
        if let Some(folder) = suite.data_folder.take() {
            suite.data_folder = Some(if folder.is_relative() {
                suite_dir.join(folder)
            } else {
                folder
            });
        }
        Ok(suite)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let suite: Suite = serde_yaml::from_str(content)?;
        if suite.cases.is_empty() {
            return Err(Error::Config(format!("Suite '{}' has no cases", suite.name)));
        }
        Ok(suite)
    }

    /// Seed variables as strings
    pub fn variables(&self) -> impl Iterator<Item = (&str, String)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), yaml_text(v)))
    }
}
