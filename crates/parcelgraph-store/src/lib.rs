//! File-based entity graph output for Parcelgraph
//!
//! The graph produced by an ingestion run is a flat directory of JSON files:
//!
//! ```text
//! out/
//!   property.json
//!   layout_1.json  layout_2.json ...
//!   person_1.json  company_1.json  sales_1.json ...
//!   relationship_property_has_address.json            (canonical edge)
//!   relationship_layout_has_layout_1.json ...         (ordinal edges)
//! ```
//!
//! Relationship files hold a pointer pair (`{"from": {"/": "./a.json"}, "to": ...}`).
//! [`RelationshipEdgeWriter`] guarantees that re-running a run never
//! accumulates duplicate edges for one `from -> to` signature, and that a
//! canonical (un-numbered) edge always wins over numbered ones.

pub mod cleanup;
pub mod documents;
pub mod edge_writer;
pub mod error;
pub mod pointer;
pub mod registry;

pub use cleanup::{remove_stale_outputs, OutputPatterns, GENERATED_OUTPUT_PATTERNS};
pub use documents::EntityWriter;
pub use edge_writer::{EdgeWriteOutcome, RelationshipEdgeWriter};
pub use error::{Result, StoreError};
pub use pointer::{json_file_name, signature_of, EntityRef, Pointer, RelationshipDocument};
pub use registry::{is_canonical_file_name, EdgeRegistries, RegisteredEdge, RelationshipRegistry};
