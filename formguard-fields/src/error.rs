//! Error types for the field registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Configuration errors raised by the field registry.
///
/// These are programmer-facing: they describe a broken form definition, never
/// a bad user value.
#[derive(Debug, Error)]
pub enum FieldsError {
    /// Field not found by name
    #[error("field not found: {name}")]
    UnknownField { name: String },

    /// Field name already registered
    #[error("duplicate field name: {name}")]
    DuplicateField { name: String },

    /// Property name is not part of the definition vocabulary
    #[error("unknown property '{property}' on field '{field}'")]
    UnknownProperty { field: String, property: String },

    /// `matches` or `depends` names a field outside the registry
    #[error("field '{field}' references unknown field '{target}' in '{property}'")]
    UnknownReference {
        field: String,
        property: String,
        target: String,
    },

    /// More than one `depends_*` condition, or a condition without `depends`
    #[error("field '{field}' has conflicting dependency conditions")]
    ConflictingDependency { field: String },

    /// Any other malformed definition
    #[error("invalid definition for field '{field}': {reason}")]
    InvalidDefinition { field: String, reason: String },

    /// Type name outside the supported vocabulary
    #[error("unknown field type: {name}")]
    UnknownType { name: String },

    /// Property patch could not be applied
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FieldsError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        FieldsError::InvalidDefinition {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
