//! Inline generator registry
//!
//! Maps a generator name to a factory. Built-in generators are registered at
//! construction; embedders add their own with [`GeneratorRegistry::register`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::{Error, Result};

/// Produces raw step rows in process
#[async_trait]
pub trait StepGenerator: Send + Sync {
    /// Generate rows; `args` are the source spec arguments after the name
    async fn generate(&self, args: &[String]) -> Result<Vec<Vec<String>>>;
}

/// Creates a fresh generator instance
pub type GeneratorFactory = Arc<dyn Fn() -> Box<dyn StepGenerator> + Send + Sync>;

/// Registry entry
#[derive(Clone)]
pub struct GeneratorEntry {
    pub name: String,
    pub description: String,
    factory: GeneratorFactory,
}

/// Name -> factory map of in-process generators
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    entries: BTreeMap<String, GeneratorEntry>,
}

impl GeneratorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in generators; `max_rows` caps what
    /// `builtin.repeat` will expand to
    pub fn with_builtins(max_rows: usize) -> Self {
        let mut registry = Self::new();
        registry.register(
            "builtin.rows",
            "Each argument is one '|'-separated row",
            || Box::new(RowsGenerator),
        );
        registry.register(
            "builtin.repeat",
            "Repeat a '|'-separated row N times, replacing {n} with 1..N",
            move || Box::new(RepeatGenerator { max_rows }),
        );
        registry
    }

    /// Register (or replace) a generator
    pub fn register<F>(&mut self, name: &str, description: &str, factory: F)
    where
        F: Fn() -> Box<dyn StepGenerator> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            GeneratorEntry {
                name: name.to_string(),
                description: description.to_string(),
                factory: Arc::new(factory),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Instantiate the generator registered under `name`
    pub fn create(&self, name: &str) -> Option<Box<dyn StepGenerator>> {
        self.entries.get(name).map(|entry| (entry.factory)())
    }

    pub fn entries(&self) -> impl Iterator<Item = &GeneratorEntry> {
        self.entries.values()
    }
}

fn split_row(spec: &str) -> Vec<String> {
    spec.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// `builtin.rows`
struct RowsGenerator;

#[async_trait]
impl StepGenerator for RowsGenerator {
    async fn generate(&self, args: &[String]) -> Result<Vec<Vec<String>>> {
        Ok(args.iter().map(|row| split_row(row)).collect())
    }
}

/// `builtin.repeat`
struct RepeatGenerator {
    max_rows: usize,
}

#[async_trait]
impl StepGenerator for RepeatGenerator {
    async fn generate(&self, args: &[String]) -> Result<Vec<Vec<String>>> {
        let failed = |reason: String| Error::GeneratorFailed {
            name: "builtin.repeat".to_string(),
            reason,
        };
        let [count, template] = args else {
            return Err(failed(format!(
                "expected <count>,<row>, got {} arguments",
                args.len()
            )));
        };
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| failed(format!("'{}' is not a repeat count", count)))?;
        if count > self.max_rows {
            return Err(failed(format!(
                "repeat count {} exceeds the {} row limit",
                count, self.max_rows
            )));
        }

        Ok((1..=count)
            .map(|n| split_row(&template.replace("{n}", &n.to_string())))
            .collect())
    }
}
