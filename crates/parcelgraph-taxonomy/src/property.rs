//! Property attribute records produced from a classified use code.

use serde::{Deserialize, Serialize};

use crate::classifier::UseCodeClassifier;
use crate::taxonomy::{PropertyType, UseCodeEntry};

/// Field path reported when the property-level use code cannot be resolved.
pub const PROPERTY_TYPE_FIELD: &str = "property.property_type";

/// The taxonomy-derived attributes written onto a property document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAttributes {
    pub property_type: PropertyType,
    pub property_usage_type: Option<String>,
    pub ownership_estate_type: Option<String>,
    pub structure_form: Option<String>,
    pub build_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_units_type: Option<String>,
}

impl From<&UseCodeEntry> for PropertyAttributes {
    fn from(entry: &UseCodeEntry) -> Self {
        Self {
            property_type: entry.property_type,
            property_usage_type: entry.property_usage_type.clone(),
            ownership_estate_type: entry.ownership_estate_type.clone(),
            structure_form: entry.structure_form.clone(),
            build_status: entry.build_status.clone(),
            number_of_units_type: entry.number_of_units_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationFailure {
    /// No use-code value was supplied at all.
    Missing,
    /// A value was supplied but no taxonomy rule matched it.
    Unmatched,
}

/// Hard failure: a required taxonomy field could not be resolved.
///
/// Serializes to a single JSON object so orchestration can report it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("cannot classify use code `{raw_value}` for `{field_path}` ({reason:?})")]
pub struct ClassificationError {
    pub error: &'static str,
    pub field_path: String,
    pub raw_value: String,
    pub reason: ClassificationFailure,
}

impl ClassificationError {
    pub fn new(field_path: impl Into<String>, raw_value: impl Into<String>, reason: ClassificationFailure) -> Self {
        Self {
            error: "classification_failure",
            field_path: field_path.into(),
            raw_value: raw_value.into(),
            reason,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

/// Classify a raw use-code value into property attributes, or fail.
///
/// A missing or unmatched value is never coerced into a guessed category.
pub fn classify_property(
    classifier: &UseCodeClassifier<'_>,
    raw: Option<&str>,
    field_path: &str,
) -> Result<PropertyAttributes, ClassificationError> {
    let raw = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => {
            return Err(ClassificationError::new(
                field_path,
                raw.unwrap_or_default(),
                ClassificationFailure::Missing,
            ))
        }
    };

    let Some(classification) = classifier.classify_detailed(raw) else {
        tracing::warn!(raw_value = raw, field_path, "use code did not match any taxonomy entry");
        return Err(ClassificationError::new(
            field_path,
            raw,
            ClassificationFailure::Unmatched,
        ));
    };

    tracing::debug!(
        raw_value = raw,
        matched = %classification.matched,
        matched_by = ?classification.matched_by,
        "classified use code"
    );
    Ok(PropertyAttributes::from(classification.entry))
}
