//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use parcelgraph_store::{EdgeRegistries, RelationshipEdgeWriter};
use parcelgraph_taxonomy::{TaxonomyError, UseCodeTaxonomy};

/// Relation names used to build edge file names (`relationship_<relation>[_<N>]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationNames {
    pub property_address: String,
    pub property_sale: String,
    pub sale_person: String,
    pub sale_company: String,
    pub property_layout: String,
    pub layout_layout: String,
}

impl Default for RelationNames {
    fn default() -> Self {
        Self {
            property_address: "property_has_address".into(),
            property_sale: "property_has_sales_history".into(),
            sale_person: "sales_history_has_person".into(),
            sale_company: "sales_history_has_company".into(),
            property_layout: "property_has_layout".into(),
            layout_layout: "layout_has_layout".into(),
        }
    }
}

impl RelationNames {
    pub fn canonical(relation: &str) -> String {
        format!("relationship_{relation}")
    }

    pub fn ordinal(relation: &str, n: usize) -> String {
        format!("relationship_{relation}_{n}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    /// External taxonomy table; the embedded one when unset.
    pub taxonomy_path: Option<PathBuf>,
    /// Delete previously generated files before writing.
    pub clean_stale: bool,
    pub relations: RelationNames,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            taxonomy_path: None,
            clean_stale: true,
            relations: RelationNames::default(),
        }
    }
}

impl RunConfig {
    pub fn load_taxonomy(&self) -> Result<UseCodeTaxonomy, TaxonomyError> {
        match &self.taxonomy_path {
            Some(path) => UseCodeTaxonomy::from_path(path),
            None => UseCodeTaxonomy::embedded(),
        }
    }

    /// Without the stale pre-pass, earlier edges are still on disk, so the
    /// writer seeds its registry from them.
    pub fn edge_writer(&self) -> RelationshipEdgeWriter {
        if self.clean_stale {
            RelationshipEdgeWriter::new(EdgeRegistries::new())
        } else {
            RelationshipEdgeWriter::hydrating(EdgeRegistries::new())
        }
    }
}
