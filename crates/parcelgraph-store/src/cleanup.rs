//! Stale-output pre-pass.
//!
//! Before regenerating a directory, files a previous run produced are deleted
//! so entities that no longer exist in the input do not linger. Only names
//! matching the generated patterns are touched.

use regex::Regex;
use std::path::Path;

use crate::edge_writer::remove_if_present;
use crate::error::{Result, StoreError};

/// Name patterns of generated files.
pub const GENERATED_OUTPUT_PATTERNS: &[&str] = &[
    r"^property\.json$",
    r"^address\.json$",
    r"^layout_\d+\.json$",
    r"^person_\d+\.json$",
    r"^company_\d+\.json$",
    r"^sales_\d+\.json$",
    r"^relationship_.+\.json$",
];

#[derive(Debug, Clone)]
pub struct OutputPatterns {
    patterns: Vec<Regex>,
}

impl OutputPatterns {
    pub fn new(patterns: &[&str]) -> std::result::Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Patterns for every file this crate writes.
    pub fn generated() -> Self {
        Self::new(GENERATED_OUTPUT_PATTERNS).unwrap()
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(file_name))
    }
}

impl Default for OutputPatterns {
    fn default() -> Self {
        Self::generated()
    }
}

/// Delete every regular file in `dir` whose name matches `patterns`.
///
/// A missing directory, or a file that disappears before it is deleted, is
/// treated as already clean. Returns the removed names in sorted order.
pub fn remove_stale_outputs(dir: &Path, patterns: &OutputPatterns) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if patterns.matches(&name) && entry.path().is_file() {
            candidates.push(name);
        }
    }
    candidates.sort();

    let mut removed = Vec::with_capacity(candidates.len());
    for name in candidates {
        if remove_if_present(&dir.join(&name))? {
            removed.push(name);
        }
    }

    tracing::info!(dir = %dir.display(), removed = removed.len(), "removed stale outputs");
    Ok(removed)
}
