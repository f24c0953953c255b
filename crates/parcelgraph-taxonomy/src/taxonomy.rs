//! The canonical use-code table.
//!
//! Each entry is an immutable attribute tuple reachable through one short code
//! and any number of human-readable descriptors. The table ships embedded in
//! the crate (`data/use_codes.json`) and can be swapped for an external file
//! with the same shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::classifier::{extract_code_candidates, normalize_label};

/// Embedded default table.
pub const DEFAULT_TAXONOMY_JSON: &str = include_str!("../data/use_codes.json");

pub const TAXONOMY_VERSION_V1: u32 = 1;

/// Top-level property category. Every entry carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    LandParcel,
    Building,
    Unit,
    ManufacturedHome,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::LandParcel => "LandParcel",
            PropertyType::Building => "Building",
            PropertyType::Unit => "Unit",
            PropertyType::ManufacturedHome => "ManufacturedHome",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical attribute tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCodeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub descriptors: Vec<String>,
    pub property_type: PropertyType,
    #[serde(default)]
    pub property_usage_type: Option<String>,
    #[serde(default)]
    pub ownership_estate_type: Option<String>,
    #[serde(default)]
    pub structure_form: Option<String>,
    #[serde(default)]
    pub build_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_units_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaxonomyFileV1 {
    version: u32,
    entries: Vec<UseCodeEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("failed to read taxonomy file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid taxonomy JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported taxonomy version {0} (expected {TAXONOMY_VERSION_V1})")]
    Version(u32),

    #[error("entry #{index} has no descriptors")]
    NoDescriptors { index: usize },

    #[error("code `{code}` is declared by entries #{first} and #{second}")]
    DuplicateCode {
        code: String,
        first: usize,
        second: usize,
    },

    #[error("descriptor `{descriptor}` normalizes to the same label in entries #{first} and #{second}")]
    DuplicateDescriptor {
        descriptor: String,
        first: usize,
        second: usize,
    },

    #[error("descriptor `{descriptor}` of entry #{owner} embeds code `{code}` owned by entry #{other}")]
    ShadowedDescriptor {
        descriptor: String,
        code: String,
        owner: usize,
        other: usize,
    },
}

/// A descriptor with its precomputed normalized form.
#[derive(Debug, Clone)]
pub(crate) struct IndexedDescriptor {
    pub normalized: String,
    pub entry: usize,
}

/// Immutable, validated use-code table.
#[derive(Debug, Clone)]
pub struct UseCodeTaxonomy {
    entries: Vec<UseCodeEntry>,
    /// upper-cased code -> entry index
    by_code: HashMap<String, usize>,
    /// normalized descriptor -> entry index
    by_descriptor: HashMap<String, usize>,
    /// every descriptor in table order (substring scan)
    descriptors: Vec<IndexedDescriptor>,
}

impl UseCodeTaxonomy {
    /// The table embedded in this crate.
    pub fn embedded() -> Result<Self, TaxonomyError> {
        Self::from_json_str(DEFAULT_TAXONOMY_JSON)
    }

    pub fn from_path(path: &Path) -> Result<Self, TaxonomyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFileV1 = serde_json::from_str(text)?;
        if file.version != TAXONOMY_VERSION_V1 {
            return Err(TaxonomyError::Version(file.version));
        }
        Self::from_entries(file.entries)
    }

    /// Build and validate a table from in-memory entries.
    pub fn from_entries(entries: Vec<UseCodeEntry>) -> Result<Self, TaxonomyError> {
        let mut by_code: HashMap<String, usize> = HashMap::new();
        let mut by_descriptor: HashMap<String, usize> = HashMap::new();
        let mut descriptors = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.descriptors.is_empty() {
                return Err(TaxonomyError::NoDescriptors { index });
            }
            if let Some(code) = &entry.code {
                let key = code.trim().to_ascii_uppercase();
                if let Some(first) = by_code.insert(key, index) {
                    return Err(TaxonomyError::DuplicateCode {
                        code: code.clone(),
                        first,
                        second: index,
                    });
                }
            }
        }

        for (index, entry) in entries.iter().enumerate() {
            for descriptor in &entry.descriptors {
                let normalized = normalize_label(descriptor);
                if normalized.is_empty() {
                    continue;
                }

                // A descriptor that carries another entry's code would be
                // captured by the code step and never reach its own entry.
                for candidate in extract_code_candidates(descriptor) {
                    if let Some(&other) = by_code.get(&candidate) {
                        if other != index {
                            return Err(TaxonomyError::ShadowedDescriptor {
                                descriptor: descriptor.clone(),
                                code: candidate,
                                owner: index,
                                other,
                            });
                        }
                    }
                }

                match by_descriptor.get(&normalized) {
                    Some(&first) if first != index => {
                        return Err(TaxonomyError::DuplicateDescriptor {
                            descriptor: descriptor.clone(),
                            first,
                            second: index,
                        });
                    }
                    Some(_) => continue,
                    None => {
                        by_descriptor.insert(normalized.clone(), index);
                        descriptors.push(IndexedDescriptor {
                            normalized,
                            entry: index,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            entries = entries.len(),
            descriptors = descriptors.len(),
            "loaded use-code taxonomy"
        );

        Ok(Self {
            entries,
            by_code,
            by_descriptor,
            descriptors,
        })
    }

    pub fn entries(&self) -> &[UseCodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup by code (case-insensitive, surrounding whitespace ignored).
    pub fn by_code(&self, code: &str) -> Option<&UseCodeEntry> {
        let key = code.trim().to_ascii_uppercase();
        self.by_code.get(&key).map(|&i| &self.entries[i])
    }

    /// Lookup by an already-normalized descriptor.
    pub fn by_normalized_descriptor(&self, normalized: &str) -> Option<&UseCodeEntry> {
        self.by_descriptor.get(normalized).map(|&i| &self.entries[i])
    }

    pub(crate) fn entry_at(&self, index: usize) -> &UseCodeEntry {
        &self.entries[index]
    }

    pub(crate) fn indexed_descriptors(&self) -> &[IndexedDescriptor] {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: Option<&str>, descriptors: &[&str], property_type: PropertyType) -> UseCodeEntry {
        UseCodeEntry {
            code: code.map(str::to_string),
            descriptors: descriptors.iter().map(|d| d.to_string()).collect(),
            property_type,
            property_usage_type: None,
            ownership_estate_type: None,
            structure_form: None,
            build_status: None,
            number_of_units_type: None,
        }
    }

    #[test]
    fn embedded_table_loads() {
        let taxonomy = UseCodeTaxonomy::embedded().unwrap();
        assert!(taxonomy.len() > 20);
        assert_eq!(
            taxonomy.by_code("0100").unwrap().property_type,
            PropertyType::Building
        );
        assert_eq!(
            taxonomy.by_code(" 0400 ").unwrap().ownership_estate_type.as_deref(),
            Some("Condominium")
        );
    }

    #[test]
    fn rejects_duplicate_codes() {
        let err = UseCodeTaxonomy::from_entries(vec![
            entry(Some("01"), &["One"], PropertyType::Building),
            entry(Some("01"), &["Other"], PropertyType::Unit),
        ])
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateCode { .. }));
    }

    #[test]
    fn rejects_descriptor_collisions_after_normalization() {
        let err = UseCodeTaxonomy::from_entries(vec![
            entry(None, &["Single-Family"], PropertyType::Building),
            entry(None, &["single family"], PropertyType::Unit),
        ])
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateDescriptor { .. }));
    }

    #[test]
    fn rejects_descriptor_shadowed_by_foreign_code() {
        let err = UseCodeTaxonomy::from_entries(vec![
            entry(Some("0100"), &["Single Family"], PropertyType::Building),
            entry(Some("0200"), &["Formerly 0100 Lot"], PropertyType::LandParcel),
        ])
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::ShadowedDescriptor { .. }));
    }

    #[test]
    fn rejects_unknown_version_and_missing_property_type() {
        let err = UseCodeTaxonomy::from_json_str(r#"{"version": 9, "entries": []}"#).unwrap_err();
        assert!(matches!(err, TaxonomyError::Version(9)));

        let err = UseCodeTaxonomy::from_json_str(
            r#"{"version": 1, "entries": [{"descriptors": ["X"]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::Json(_)));
    }

    #[test]
    fn loads_external_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        std::fs::write(
            &path,
            r#"{"version": 1, "entries": [
                {"code": "R1", "descriptors": ["Residential One"], "property_type": "Building"}
            ]}"#,
        )
        .unwrap();
        let taxonomy = UseCodeTaxonomy::from_path(&path).unwrap();
        assert_eq!(taxonomy.len(), 1);
        assert!(taxonomy.by_code("r1").is_some());

        let missing = UseCodeTaxonomy::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, TaxonomyError::Io { .. }));
    }
}
