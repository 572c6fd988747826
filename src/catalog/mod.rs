//! Read-only index of practice problems.
//!
//! The catalog is either the bundled index (`builtin.toml`) or a TOML file
//! with the same `[[problems]]` layout pointed to by `catalog.path`.

mod problem;

pub use problem::{Difficulty, Mode, Pattern, Problem};

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::config::CatalogConfig;
use crate::types::errors::RehearseError;
use crate::RehearseResult;

const BUILTIN_CATALOG: &str = include_str!("builtin.toml");

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    problems: Vec<Problem>,
}

/// Immutable problem index.
#[derive(Debug, Clone)]
pub struct Catalog {
    problems: Vec<Problem>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids.
    pub fn new(problems: Vec<Problem>) -> RehearseResult<Self> {
        let mut seen = HashSet::new();
        for problem in &problems {
            if !seen.insert(problem.id.as_str()) {
                return Err(RehearseError::config(format!(
                    "duplicate problem id '{}' in catalog",
                    problem.id
                )));
            }
        }
        Ok(Self { problems })
    }

    /// Parses a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> RehearseResult<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.problems)
    }

    /// Loads a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> RehearseResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            problems = catalog.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// The bundled problem index.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_CATALOG).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Bundled catalog is malformed");
            Self { problems: Vec::new() }
        })
    }

    /// Resolves the catalog named by the configuration, falling back to the
    /// bundled one.
    pub fn from_config(config: &CatalogConfig) -> RehearseResult<Self> {
        match &config.path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Looks up a problem by id.
    pub fn get(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == problem_id)
    }

    /// Problems eligible for `mode`, optionally restricted to one pattern,
    /// in catalog order.
    pub fn list(&self, mode: Mode, pattern: Option<Pattern>) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| p.mode() == mode)
            .filter(|p| pattern.map_or(true, |pat| p.pattern == pat))
            .collect()
    }

    /// Patterns of `mode` with at least one problem, in the mode's order.
    pub fn patterns_with_problems(&self, mode: Mode) -> Vec<Pattern> {
        mode.patterns()
            .iter()
            .copied()
            .filter(|pattern| self.problems.iter().any(|p| p.pattern == *pattern))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
