//! Relative-path pointers between entity documents.

use serde::{Deserialize, Serialize};

/// A relative path reference to another entity's output file (`./layout_3.json`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(String);

impl EntityRef {
    /// Reference to `<stem>.json` in the same output directory.
    pub fn file(stem: &str) -> Self {
        Self(format!("./{}", json_file_name(stem)))
    }

    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{"/": "./property.json"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "/")]
    pub path: String,
}

/// On-disk body of a relationship file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDocument {
    pub from: Pointer,
    pub to: Pointer,
}

impl RelationshipDocument {
    pub fn new(from: &EntityRef, to: &EntityRef) -> Self {
        Self {
            from: Pointer {
                path: from.as_str().to_string(),
            },
            to: Pointer {
                path: to.as_str().to_string(),
            },
        }
    }

    pub fn signature(&self) -> String {
        signature_of(&self.from.path, &self.to.path)
    }
}

/// Dedup identity of an edge: `from -> to`.
pub fn signature_of(from: &str, to: &str) -> String {
    format!("{from}->{to}")
}

/// Append `.json` unless already present.
pub fn json_file_name(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    }
}
