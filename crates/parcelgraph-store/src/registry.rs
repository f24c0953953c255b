//! Run-scoped index of relationship files already written, one per output
//! directory.
//!
//! The registry is an explicit value owned by the caller for the duration of a
//! run; nothing here is process-global.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Result, StoreError};
use crate::pointer::RelationshipDocument;

fn ordinal_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_\d+\.json$").unwrap())
}

fn relationship_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^relationship_.+\.json$").unwrap())
}

/// A file name is canonical unless it ends in an ordinal suffix (`_<N>.json`).
pub fn is_canonical_file_name(file_name: &str) -> bool {
    !ordinal_suffix_re().is_match(file_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEdge {
    pub file_name: String,
    pub canonical: bool,
    /// Seeded from disk and not yet requested by the current run.
    pub prior_run: bool,
}

/// signature -> registered file, for a single directory.
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    by_signature: HashMap<String, RegisteredEdge>,
    /// file name -> signature it currently holds
    by_file: HashMap<String, String>,
    /// prior-run files whose signature is held by a better file
    superseded: Vec<String>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &str) -> Option<&RegisteredEdge> {
        self.by_signature.get(signature)
    }

    pub fn signature_of_file(&self, file_name: &str) -> Option<&str> {
        self.by_file.get(file_name).map(String::as_str)
    }

    /// Signature held by `file_name`, if it was written or claimed by the
    /// current run.
    pub fn live_signature_of_file(&self, file_name: &str) -> Option<&str> {
        let signature = self.by_file.get(file_name)?;
        self.by_signature
            .get(signature)
            .filter(|edge| !edge.prior_run)
            .map(|_| signature.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }

    /// Record `file_name` as the file holding `signature` for the current run.
    ///
    /// Any other signature previously held by that file name is forgotten,
    /// and the signature's previous file (if different) is unmapped.
    pub fn register(&mut self, signature: &str, file_name: &str) {
        self.insert(signature, file_name, false);
    }

    /// Mark a prior-run entry as requested by the current run, in place.
    pub fn claim(&mut self, signature: &str) {
        if let Some(edge) = self.by_signature.get_mut(signature) {
            edge.prior_run = false;
        }
    }

    pub fn forget(&mut self, signature: &str) {
        if let Some(previous) = self.by_signature.remove(signature) {
            self.by_file.remove(&previous.file_name);
        }
    }

    /// Drain the duplicate files found by [`hydrate`](Self::hydrate).
    pub fn take_superseded(&mut self) -> Vec<String> {
        std::mem::take(&mut self.superseded)
    }

    fn insert(&mut self, signature: &str, file_name: &str, prior_run: bool) {
        if let Some(previous_sig) = self.by_file.get(file_name) {
            if previous_sig != signature {
                let previous_sig = previous_sig.clone();
                self.by_signature.remove(&previous_sig);
            }
        }
        if let Some(previous) = self.by_signature.get(signature) {
            if previous.file_name != file_name {
                self.by_file.remove(&previous.file_name);
            }
        }

        self.by_file
            .insert(file_name.to_string(), signature.to_string());
        self.by_signature.insert(
            signature.to_string(),
            RegisteredEdge {
                file_name: file_name.to_string(),
                canonical: is_canonical_file_name(file_name),
                prior_run,
            },
        );
    }

    /// Seed the registry from `relationship_*.json` files already in `dir`.
    ///
    /// Files are visited in name order and registered as prior-run entries.
    /// For a signature held by several files, a canonical file wins over
    /// ordinal ones, otherwise the first name wins; the losing files are kept
    /// for [`take_superseded`](Self::take_superseded). Unreadable or malformed
    /// files are skipped. Returns the number of signatures registered.
    pub fn hydrate(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if relationship_file_re().is_match(&name) {
                names.push(name);
            }
        }
        names.sort();

        for name in names {
            let path = dir.join(&name);
            let doc: RelationshipDocument = match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
            {
                Ok(doc) => doc,
                Err(error) => {
                    tracing::warn!(file = %path.display(), %error, "skipping unreadable relationship file");
                    continue;
                }
            };

            let signature = doc.signature();
            let held = self
                .by_signature
                .get(&signature)
                .map(|existing| (existing.file_name.clone(), !existing.canonical && is_canonical_file_name(&name)));
            match held {
                None => self.insert(&signature, &name, true),
                Some((previous, true)) => {
                    self.superseded.push(previous);
                    self.insert(&signature, &name, true);
                }
                Some((_, false)) => self.superseded.push(name),
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            edges = self.len(),
            superseded = self.superseded.len(),
            "hydrated relationship registry"
        );
        Ok(self.len())
    }
}

/// One registry per resolved output directory.
#[derive(Debug, Clone, Default)]
pub struct EdgeRegistries {
    by_dir: HashMap<PathBuf, RelationshipRegistry>,
}

impl EdgeRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for `dir`, created empty on first use.
    pub fn for_dir(&mut self, dir: &Path) -> &mut RelationshipRegistry {
        self.by_dir.entry(resolve_dir(dir)).or_default()
    }

    pub fn get(&self, dir: &Path) -> Option<&RelationshipRegistry> {
        self.by_dir.get(&resolve_dir(dir))
    }

    /// Registry for `dir`, hydrated from disk the first time it is requested.
    pub fn hydrated_for_dir(&mut self, dir: &Path) -> Result<&mut RelationshipRegistry> {
        let key = resolve_dir(dir);
        if !self.by_dir.contains_key(&key) {
            let mut registry = RelationshipRegistry::new();
            registry.hydrate(dir)?;
            self.by_dir.insert(key.clone(), registry);
        }
        Ok(self.by_dir.entry(key).or_default())
    }
}

/// Canonical form of a directory path; falls back to the path as given when it
/// does not exist yet.
pub fn resolve_dir(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
