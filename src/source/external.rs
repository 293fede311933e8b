//! External generator resolution
//!
//! Generators authored outside this binary are described by a YAML manifest
//! at `<load_folder>/<name>.yaml`, where the load folder is a local path or
//! an `http(s)://` base URL. Only names on the configured allowlist are
//! looked up here. A manifest either lists its rows directly or names a
//! command whose stdout is a JSON array of rows:
//!
//! ```yaml
//! description: Login smoke steps
//! rows:
//!   - [L1, open, "", "", "", yes, "url=https://example.com", Open site]
//! ```
//!
//! ```yaml
//! command:
//!   program: ./gen-login.sh
//!   args: [--env, qa]
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use crate::common::config::LoaderConfig;
use crate::common::paths::is_http;
use crate::common::{Error, Result};

use super::registry::StepGenerator;

/// Command a manifest delegates row generation to
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Parsed generator manifest
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorManifest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_yaml::Value>>,
    #[serde(default)]
    pub command: Option<CommandSpec>,
}

impl GeneratorManifest {
    /// Parse and validate manifest bytes
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_yaml::from_slice(bytes).map_err(|e| Error::ManifestParse {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if manifest.rows.is_empty() && manifest.command.is_none() {
            return Err(Error::ManifestParse {
                name: name.to_string(),
                reason: "manifest needs 'rows' or 'command'".to_string(),
            });
        }
        Ok(manifest)
    }
}

/// Render a YAML scalar as cell text; null is the empty string
pub(crate) fn yaml_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Generator materialized from a manifest
struct ManifestGenerator {
    name: String,
    manifest: Arc<GeneratorManifest>,
    /// Folder relative command paths resolve against (local load folders only)
    base_dir: Option<PathBuf>,
}

impl ManifestGenerator {
    fn resolve_program(&self, program: &str) -> Result<PathBuf> {
        if program.contains('/') || program.contains('\\') {
            let path = PathBuf::from(program);
            return Ok(match (&self.base_dir, path.is_relative()) {
                (Some(base), true) => base.join(path),
                _ => path,
            });
        }
        which::which(program).map_err(|e| Error::GeneratorFailed {
            name: self.name.clone(),
            reason: format!("program '{}' not found: {}", program, e),
        })
    }

    async fn run_command(&self, command: &CommandSpec, args: &[String]) -> Result<Vec<Vec<String>>> {
        let program = self.resolve_program(&command.program)?;
        tracing::debug!("Generator {} running {}", self.name, program.display());

        let output = tokio::process::Command::new(&program)
            .args(&command.args)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::GeneratorFailed {
                name: self.name.clone(),
                reason: format!("failed to run {}: {}", program.display(), e),
            })?;

        if !output.status.success() {
            return Err(Error::GeneratorFailed {
                name: self.name.clone(),
                reason: format!(
                    "{} exited with {:?}: {}",
                    program.display(),
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let rows: Vec<Vec<serde_json::Value>> =
            serde_json::from_slice(&output.stdout).map_err(|e| Error::GeneratorFailed {
                name: self.name.clone(),
                reason: format!("stdout is not a JSON array of rows: {}", e),
            })?;
        Ok(rows
            .iter()
            .map(|row| row.iter().map(json_text).collect())
            .collect())
    }
}

#[async_trait]
impl StepGenerator for ManifestGenerator {
    async fn generate(&self, args: &[String]) -> Result<Vec<Vec<String>>> {
        match &self.manifest.command {
            Some(command) => self.run_command(command, args).await,
            None => Ok(self
                .manifest
                .rows
                .iter()
                .map(|row| row.iter().map(yaml_text).collect())
                .collect()),
        }
    }
}

/// Resolves allowlisted generator names to manifests outside the process
pub struct ExternalResolver {
    load_folder: String,
    allowlist: BTreeSet<String>,
    max_bytes: usize,
    http: reqwest::Client,
    cache: HashMap<String, Arc<GeneratorManifest>>,
    last_error: Option<String>,
}

impl ExternalResolver {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            load_folder: config.load_folder.clone(),
            allowlist: config.external.iter().cloned().collect(),
            max_bytes: config.max_fetch_bytes,
            http: reqwest::Client::new(),
            cache: HashMap::new(),
            last_error: None,
        }
    }

    /// Whether `name` may be resolved externally
    pub fn is_eligible(&self, name: &str) -> bool {
        self.allowlist.contains(name)
    }

    pub fn allowlist(&self) -> impl Iterator<Item = &String> {
        self.allowlist.iter()
    }

    pub fn load_folder(&self) -> &str {
        &self.load_folder
    }

    /// Why the most recent resolution failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Manifest location for `name`
    pub fn location_for(&self, name: &str) -> String {
        let base = self.load_folder.trim_end_matches(['/', '\\']);
        format!("{}/{}.yaml", base, name)
    }

    /// Resolve `name`; failures are kept in [`last_error`](Self::last_error)
    pub async fn resolve(&mut self, name: &str) -> Option<Box<dyn StepGenerator>> {
        self.last_error = None;
        if !self.is_eligible(name) {
            self.last_error = Some(format!("'{}' is not eligible for external loading", name));
            return None;
        }

        let manifest = match self.cache.get(name) {
            Some(manifest) => manifest.clone(),
            None => match self.fetch_manifest(name).await {
                Ok(manifest) => {
                    let manifest = Arc::new(manifest);
                    self.cache.insert(name.to_string(), manifest.clone());
                    manifest
                }
                Err(e) => {
                    tracing::warn!("External generator {} unavailable: {}", name, e);
                    self.last_error = Some(e.to_string());
                    return None;
                }
            },
        };

        let base_dir = (!is_http(&self.load_folder)).then(|| PathBuf::from(&self.load_folder));
        Some(Box::new(ManifestGenerator {
            name: name.to_string(),
            manifest,
            base_dir,
        }))
    }

    async fn fetch_manifest(&self, name: &str) -> Result<GeneratorManifest> {
        let location = self.location_for(name);
        tracing::info!("Resolving external generator {} from {}", name, location);
        let bytes = if is_http(&location) {
            self.fetch_http(&location).await?
        } else {
            self.fetch_local(&location).await?
        };
        GeneratorManifest::from_bytes(name, &bytes)
    }

    async fn fetch_local(&self, location: &str) -> Result<Vec<u8>> {
        let metadata = tokio::fs::metadata(location)
            .await
            .map_err(|e| Error::external_fetch(location, e.to_string()))?;
        if metadata.len() > self.max_bytes as u64 {
            return Err(Error::external_fetch(
                location,
                format!("{} bytes exceeds the {} byte limit", metadata.len(), self.max_bytes),
            ));
        }
        tokio::fs::read(location)
            .await
            .map_err(|e| Error::external_fetch(location, e.to_string()))
    }

    async fn fetch_http(&self, location: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(location)
            .header("User-Agent", "tablerun")
            .send()
            .await
            .map_err(|e| Error::external_fetch(location, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::external_fetch(
                location,
                format!("HTTP status {}", response.status()),
            ));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::external_fetch(location, e.to_string()))?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(Error::external_fetch(
                    location,
                    format!("response exceeds the {} byte limit", self.max_bytes),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}
