use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid output file name `{0}`")]
    InvalidFileName(String),

    #[error("`{file_name}` already holds `{held}` in this run; refusing to overwrite it with `{requested}`")]
    FileNameConflict {
        file_name: String,
        held: String,
        requested: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
