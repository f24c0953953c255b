//! Entity documents: one JSON file per entity in the output directory.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::edge_writer::to_document_bytes;
use crate::error::{Result, StoreError};
use crate::pointer::{json_file_name, EntityRef};

/// Writes `<stem>.json` entity files into a single output directory.
#[derive(Debug, Clone)]
pub struct EntityWriter {
    dir: PathBuf,
}

impl EntityWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize `value` to `<stem>.json` and return a pointer to it.
    ///
    /// Identical values always produce identical bytes, so re-running a write
    /// leaves the file unchanged.
    pub fn write<T: Serialize + ?Sized>(&self, stem: &str, value: &T) -> Result<EntityRef> {
        if stem.is_empty() || stem.contains('/') || stem.contains('\\') || stem.starts_with('.') {
            return Err(StoreError::InvalidFileName(stem.to_string()));
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let path = self.dir.join(json_file_name(stem));
        let bytes = to_document_bytes(value)?;
        std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
        tracing::trace!(file = %path.display(), "wrote entity document");
        Ok(EntityRef::file(stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_pretty_json_and_returns_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EntityWriter::new(dir.path().join("out"));

        let r = writer.write("person_1", &json!({"first_name": "Jane"})).unwrap();
        assert_eq!(r.as_str(), "./person_1.json");

        let text = std::fs::read_to_string(dir.path().join("out/person_1.json")).unwrap();
        assert_eq!(text, "{\n  \"first_name\": \"Jane\"\n}\n");
    }

    #[test]
    fn rejects_path_like_stems() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EntityWriter::new(dir.path());
        assert!(writer.write("../x", &json!({})).is_err());
        assert!(writer.write("", &json!({})).is_err());
    }
}
