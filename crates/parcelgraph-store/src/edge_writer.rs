//! Relationship edge writer with duplicate detection and canonical promotion.
//!
//! Every edge has a signature (`from -> to`). Within one output directory and
//! one run, a signature is held by at most one file:
//!
//! | registered                  | requested name      | action                               |
//! |-----------------------------|---------------------|--------------------------------------|
//! | none / file missing         | any                 | write, register                      |
//! | any                         | same name           | rewrite                              |
//! | canonical                   | ordinal             | skip                                 |
//! | canonical, this run         | other canonical     | rewrite the registered file          |
//! | ordinal                     | canonical           | delete old file, write, register     |
//! | from a previous run         | other name          | delete old file, write, register     |
//! | ordinal, this run           | other ordinal       | skip                                 |
//!
//! A file written or claimed earlier in the same run is never overwritten
//! with a different signature; that request fails with
//! [`StoreError::FileNameConflict`].

use serde::Serialize;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::pointer::{json_file_name, signature_of, EntityRef, RelationshipDocument};
use crate::registry::{is_canonical_file_name, EdgeRegistries, RegisteredEdge, RelationshipRegistry};

/// What a single `write_edge` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EdgeWriteOutcome {
    /// No file held the signature; a new file was written.
    Written { file_name: String },
    /// The registered file was rewritten with identical content.
    Rewritten { file_name: String },
    /// An ordinal file was replaced by the canonical one.
    Promoted { file_name: String, replaced: String },
    /// A previous run's file was moved to the name requested now.
    Moved { file_name: String, replaced: String },
    /// The signature is already held by `existing`; nothing was written.
    Skipped { file_name: String, existing: String },
}

impl EdgeWriteOutcome {
    /// The file that holds the signature after the call.
    pub fn held_by(&self) -> &str {
        match self {
            EdgeWriteOutcome::Written { file_name }
            | EdgeWriteOutcome::Rewritten { file_name }
            | EdgeWriteOutcome::Promoted { file_name, .. }
            | EdgeWriteOutcome::Moved { file_name, .. } => file_name,
            EdgeWriteOutcome::Skipped { existing, .. } => existing,
        }
    }

    pub fn wrote(&self) -> bool {
        !matches!(self, EdgeWriteOutcome::Skipped { .. })
    }
}

/// Writes relationship documents through an injected, run-scoped registry set.
#[derive(Debug, Default)]
pub struct RelationshipEdgeWriter {
    registries: EdgeRegistries,
    hydrate: bool,
}

impl RelationshipEdgeWriter {
    /// Writer that only knows about edges written through itself.
    pub fn new(registries: EdgeRegistries) -> Self {
        Self {
            registries,
            hydrate: false,
        }
    }

    /// Writer that additionally seeds each directory's registry from the
    /// relationship files already on disk the first time it writes there.
    pub fn hydrating(registries: EdgeRegistries) -> Self {
        Self {
            registries,
            hydrate: true,
        }
    }

    pub fn registries(&self) -> &EdgeRegistries {
        &self.registries
    }

    pub fn into_registries(self) -> EdgeRegistries {
        self.registries
    }

    pub fn write_edge(
        &mut self,
        dir: &Path,
        file_name: &str,
        from: &EntityRef,
        to: &EntityRef,
    ) -> Result<EdgeWriteOutcome> {
        let file_name = json_file_name(file_name);
        validate_file_name(&file_name)?;
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let signature = signature_of(from.as_str(), to.as_str());
        let canonical = is_canonical_file_name(&file_name);
        let doc = RelationshipDocument::new(from, to);

        let registry = if self.hydrate {
            self.registries.hydrated_for_dir(dir)?
        } else {
            self.registries.for_dir(dir)
        };
        for stale in registry.take_superseded() {
            if remove_if_present(&dir.join(&stale))? {
                tracing::debug!(file = %stale, "removed duplicate edge from a previous run");
            }
        }

        let existing: Option<RegisteredEdge> = registry
            .get(&signature)
            .filter(|edge| dir.join(&edge.file_name).is_file())
            .cloned();

        let outcome = match existing {
            None => {
                ensure_unclaimed(registry, &file_name, &signature)?;
                write_document(dir, &file_name, &doc)?;
                registry.register(&signature, &file_name);
                EdgeWriteOutcome::Written { file_name }
            }
            Some(edge) if edge.file_name == file_name => {
                write_document(dir, &file_name, &doc)?;
                registry.register(&signature, &file_name);
                EdgeWriteOutcome::Rewritten { file_name }
            }
            Some(edge) if edge.canonical && !canonical => {
                registry.claim(&signature);
                EdgeWriteOutcome::Skipped {
                    file_name,
                    existing: edge.file_name,
                }
            }
            Some(edge) if edge.canonical && !edge.prior_run => {
                tracing::debug!(
                    requested = %file_name,
                    existing = %edge.file_name,
                    %signature,
                    "signature already has a canonical file; rewriting it instead"
                );
                write_document(dir, &edge.file_name, &doc)?;
                EdgeWriteOutcome::Rewritten {
                    file_name: edge.file_name,
                }
            }
            Some(edge) if canonical || edge.prior_run => {
                ensure_unclaimed(registry, &file_name, &signature)?;
                remove_if_present(&dir.join(&edge.file_name))?;
                write_document(dir, &file_name, &doc)?;
                registry.register(&signature, &file_name);
                if canonical && !edge.canonical {
                    tracing::debug!(
                        replaced = %edge.file_name,
                        canonical = %file_name,
                        "promoted ordinal edge to canonical"
                    );
                    EdgeWriteOutcome::Promoted {
                        file_name,
                        replaced: edge.file_name,
                    }
                } else {
                    tracing::debug!(
                        replaced = %edge.file_name,
                        requested = %file_name,
                        "moved edge from a previous run"
                    );
                    EdgeWriteOutcome::Moved {
                        file_name,
                        replaced: edge.file_name,
                    }
                }
            }
            Some(edge) => EdgeWriteOutcome::Skipped {
                file_name,
                existing: edge.file_name,
            },
        };

        if let EdgeWriteOutcome::Skipped { file_name, existing } = &outcome {
            tracing::debug!(requested = %file_name, %existing, %signature, "skipped duplicate edge");
        }
        Ok(outcome)
    }
}

fn ensure_unclaimed(registry: &RelationshipRegistry, file_name: &str, signature: &str) -> Result<()> {
    match registry.live_signature_of_file(file_name) {
        Some(held) if held != signature => Err(StoreError::FileNameConflict {
            file_name: file_name.to_string(),
            held: held.to_string(),
            requested: signature.to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_file_name(file_name: &str) -> Result<()> {
    let stem = file_name.trim_end_matches(".json");
    if stem.is_empty() || file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.') {
        return Err(StoreError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

/// Pretty JSON with a trailing newline, so identical records produce identical bytes.
pub(crate) fn to_document_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_document(dir: &Path, file_name: &str, doc: &RelationshipDocument) -> Result<()> {
    let path = dir.join(file_name);
    let bytes = to_document_bytes(doc)?;
    std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))
}

pub(crate) fn remove_if_present(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
