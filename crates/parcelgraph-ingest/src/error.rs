use parcelgraph_store::StoreError;
use parcelgraph_taxonomy::{ClassificationError, TaxonomyError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read seed `{path}`: {source}")]
    SeedIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed document: {0}")]
    SeedJson(#[from] serde_json::Error),
}

impl PipelineError {
    /// The structured classification failure, if that is what this is.
    pub fn as_classification(&self) -> Option<&ClassificationError> {
        match self {
            PipelineError::Classification(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
