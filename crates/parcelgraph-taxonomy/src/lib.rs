//! Property use-code taxonomy for Parcelgraph
//!
//! Scraped property records describe land use with whatever label or code the
//! source jurisdiction happens to use (`"SINGLE FAMILY"`, `"0100"`,
//! `"Single Family (0100)"`, `"SFR"`, ...). This crate maps those values onto a
//! small canonical taxonomy:
//!
//! - [`UseCodeTaxonomy`]: the immutable table (embedded JSON, or loaded from a file)
//! - [`UseCodeClassifier`]: code → exact → substring resolution over the table
//! - [`classify_property`]: the attribute record for a property, or a
//!   structured [`ClassificationError`]
//!
//! Classification never guesses. An unresolved value is a hard error carrying
//! the offending raw value and the field path it was destined for.

pub mod classifier;
pub mod property;
pub mod taxonomy;

pub use classifier::{
    extract_code_candidates, normalize_label, Classification, MatchKind, UseCodeClassifier,
};
pub use property::{
    classify_property, ClassificationError, ClassificationFailure, PropertyAttributes,
    PROPERTY_TYPE_FIELD,
};
pub use taxonomy::{PropertyType, TaxonomyError, UseCodeEntry, UseCodeTaxonomy};
