//! Step sources
//!
//! A [`SourceSpec`] names where a test table comes from: a file whose
//! extension picks the parser, or an inline generator resolved through the
//! [`GeneratorRegistry`] (and, for allowlisted names, the
//! [`ExternalResolver`]). Every parser's output is normalized into a
//! [`StepTable`] of fixed-width rows in source order.

pub mod external;
pub mod html;
pub mod registry;
pub mod spreadsheet;
pub mod xml;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::config::LoaderConfig;
use crate::common::paths::resolve_in;
use crate::common::{Error, Result};

pub use external::{ExternalResolver, GeneratorManifest};
pub use registry::{GeneratorRegistry, StepGenerator};

/// Number of fields in a step row
pub const ROW_WIDTH: usize = 8;

/// Column names in row order
pub const COLUMNS: [&str; ROW_WIDTH] = [
    "id",
    "action",
    "locType",
    "locSpecs",
    "qryFunction",
    "active",
    "data",
    "description",
];

/// Map a header or element name onto its column index
///
/// Accepts the canonical names case-insensitively plus a few long-hand
/// aliases (`locatorType`, `queryFunction`, ...).
pub fn column_index(name: &str) -> Option<usize> {
    let key = name.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
    let index = match key.as_str() {
        "id" | "stepid" => 0,
        "action" => 1,
        "loctype" | "locatortype" => 2,
        "locspecs" | "locspec" | "locatorspec" | "locatorspecs" => 3,
        "qryfunction" | "queryfunction" | "query" => 4,
        "active" => 5,
        "data" => 6,
        "description" | "desc" => 7,
        _ => return None,
    };
    Some(index)
}

/// One normalized step row
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SourceRow {
    cells: [String; ROW_WIDTH],
}

impl SourceRow {
    /// Build a row from raw cells, padding short rows and truncating long ones
    pub fn from_cells(cells: Vec<String>) -> Self {
        let mut row = Self::default();
        for (slot, cell) in row.cells.iter_mut().zip(cells) {
            *slot = cell.trim().to_string();
        }
        row
    }

    pub fn cells(&self) -> &[String; ROW_WIDTH] {
        &self.cells
    }

    pub fn id(&self) -> &str {
        &self.cells[0]
    }

    pub fn action(&self) -> &str {
        &self.cells[1]
    }

    pub fn locator_type(&self) -> &str {
        &self.cells[2]
    }

    pub fn locator_spec(&self) -> &str {
        &self.cells[3]
    }

    pub fn query_function(&self) -> &str {
        &self.cells[4]
    }

    pub fn active(&self) -> &str {
        &self.cells[5]
    }

    pub fn data(&self) -> &str {
        &self.cells[6]
    }

    pub fn description(&self) -> &str {
        &self.cells[7]
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }

    fn is_header(&self) -> bool {
        column_index(self.id()) == Some(0) && column_index(self.action()) == Some(1)
    }
}

/// Ordered step rows; order is execution order
pub type StepTable = Vec<SourceRow>;

/// Normalize raw parser output into a step table
///
/// Blank rows are dropped, as is a leading header row.
pub fn normalize(raw: Vec<Vec<String>>) -> StepTable {
    let mut rows: StepTable = raw
        .into_iter()
        .map(SourceRow::from_cells)
        .filter(|row| !row.is_blank())
        .collect();
    if rows.first().is_some_and(SourceRow::is_header) {
        rows.remove(0);
    }
    rows
}

/// File formats a file source can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xml,
    Html,
    Xls,
    Xlsx,
}

impl FileFormat {
    /// Pick the format from a file name's extension
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(FileFormat::Xml),
            "html" | "htm" => Some(FileFormat::Html),
            "xls" => Some(FileFormat::Xls),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }

    /// Accepted number of spec arguments (file name included)
    fn accepts_args(&self, count: usize) -> bool {
        (1..=2).contains(&count)
    }
}

/// Where a test table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// `file,<name>[,<selector>]`
    File { args: Vec<String> },
    /// `inline,<generator>[,args...]`
    Inline { generator: String, args: Vec<String> },
}

impl SourceSpec {
    /// Parse the textual `kind,arg,...` form
    ///
    /// Arguments are comma separated; wrap an argument in double quotes to
    /// keep commas inside it (`""` inside quotes is a literal quote).
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = split_args(text);
        if parts.is_empty() || parts[0].is_empty() {
            return Err(Error::source_spec(text, "missing source kind"));
        }
        let kind = parts.remove(0).to_ascii_lowercase();
        match kind.as_str() {
            "file" => {
                if parts.first().map_or(true, |name| name.is_empty()) {
                    return Err(Error::source_spec(text, "file source needs a file name"));
                }
                Ok(SourceSpec::File { args: parts })
            }
            "inline" => {
                if parts.first().map_or(true, |name| name.is_empty()) {
                    return Err(Error::source_spec(text, "inline source needs a generator name"));
                }
                let generator = parts.remove(0);
                Ok(SourceSpec::Inline {
                    generator,
                    args: parts,
                })
            }
            other => Err(Error::source_spec(
                text,
                format!("unknown source kind '{}', expected 'file' or 'inline'", other),
            )),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File { args } => write!(f, "file,{}", args.join(",")),
            SourceSpec::Inline { generator, args } if args.is_empty() => {
                write!(f, "inline,{}", generator)
            }
            SourceSpec::Inline { generator, args } => {
                write!(f, "inline,{},{}", generator, args.join(","))
            }
        }
    }
}

fn split_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => {
                args.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// Resolves a [`SourceSpec`] to a step table
pub struct SourceLoader {
    data_folder: PathBuf,
    registry: GeneratorRegistry,
    external: ExternalResolver,
    max_rows: usize,
}

impl SourceLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            data_folder: config.data_folder.clone(),
            registry: GeneratorRegistry::with_builtins(config.max_rows),
            external: ExternalResolver::new(config),
            max_rows: config.max_rows,
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn set_data_folder(&mut self, folder: impl Into<PathBuf>) {
        self.data_folder = folder.into();
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Register additional in-process generators
    pub fn registry_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.registry
    }

    pub fn external(&self) -> &ExternalResolver {
        &self.external
    }

    /// Load a table, turning any failure into an empty table and a warning
    pub async fn load(&mut self, spec: &SourceSpec) -> StepTable {
        match self.try_load(spec).await {
            Ok(table) => {
                tracing::info!("Loaded {} step rows from {}", table.len(), spec);
                table
            }
            Err(e) => {
                tracing::warn!("Could not load steps from {}: {}", spec, e);
                Vec::new()
            }
        }
    }

    /// Parse the textual spec and load it; malformed specs give an empty table
    pub async fn load_str(&mut self, text: &str) -> StepTable {
        match SourceSpec::parse(text) {
            Ok(spec) => self.load(&spec).await,
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Load a table, reporting the failure reason
    pub async fn try_load(&mut self, spec: &SourceSpec) -> Result<StepTable> {
        let raw = match spec {
            SourceSpec::File { args } => self.load_file(args).await?,
            SourceSpec::Inline { generator, args } => self.load_inline(generator, args).await?,
        };
        Ok(normalize(raw))
    }

    async fn load_file(&self, args: &[String]) -> Result<Vec<Vec<String>>> {
        let name = args
            .first()
            .ok_or_else(|| Error::source_spec("file", "missing file name"))?;
        let format =
            FileFormat::from_name(name).ok_or_else(|| Error::UnsupportedSource(name.clone()))?;
        if !format.accepts_args(args.len()) {
            return Err(Error::source_spec(
                &args.join(","),
                format!("{:?} sources take a file name and at most one selector", format),
            ));
        }

        let path = resolve_in(&self.data_folder, name);
        let selector = args.get(1).map(String::as_str).filter(|s| !s.is_empty());
        tracing::debug!("Parsing {:?} source {}", format, path.display());

        match format {
            FileFormat::Xml => {
                let content = read_text(&path).await?;
                xml::parse_records(&content, selector.unwrap_or(xml::DEFAULT_RECORD), name)
            }
            FileFormat::Html => {
                let content = read_text(&path).await?;
                html::parse_table(&content, selector, name)
            }
            FileFormat::Xls | FileFormat::Xlsx => {
                let sheet = selector.map(str::to_string);
                tokio::task::spawn_blocking(move || match format {
                    FileFormat::Xls => spreadsheet::read_xls(&path, sheet.as_deref()),
                    _ => spreadsheet::read_xlsx(&path, sheet.as_deref()),
                })
                .await
                .map_err(|e| Error::Internal(format!("spreadsheet reader: {}", e)))?
            }
        }
    }

    async fn load_inline(&mut self, name: &str, args: &[String]) -> Result<Vec<Vec<String>>> {
        let generator = match self.registry.create(name) {
            Some(generator) => generator,
            None if self.external.is_eligible(name) => {
                match self.external.resolve(name).await {
                    Some(generator) => generator,
                    None => {
                        return Err(Error::generator_not_found(
                            name,
                            self.external.last_error().map(str::to_string),
                        ))
                    }
                }
            }
            None => return Err(Error::generator_not_found(name, None)),
        };

        tracing::debug!("Running generator {}", name);
        let rows = generator.generate(args).await?;
        if rows.len() > self.max_rows {
            return Err(Error::GeneratorFailed {
                name: name.to_string(),
                reason: format!("{} rows exceed the {} row limit", rows.len(), self.max_rows),
            });
        }
        Ok(rows)
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })
}
