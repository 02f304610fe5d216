//! Error types for the validation engine

use formguard_fields::FieldsError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Failures raised by a [`Form`](crate::Form).
///
/// None of these is a user-facing validation violation; violations are
/// collected by the error aggregator instead. `MissingField` is the one
/// caller-facing case: the payload left out a field the form contract expects.
#[derive(Debug, Error)]
pub enum FormError {
    /// Broken field definition
    #[error(transparent)]
    Fields(#[from] FieldsError),

    /// Bulk input omitted a non-optional field
    #[error("missing field in input: {name}")]
    MissingField { name: String },

    /// Errors were read before any validation pass
    #[error("form has not been validated yet")]
    ValidationNotRun,

    /// `depends` rules form a loop
    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// Options provider does not know the list a field refers to
    #[error("field '{field}' refers to unknown options list '{list}'")]
    UnknownOptionsList { field: String, list: String },

    /// Grouped projection requested before groups were configured
    #[error("no field groups configured")]
    GroupsNotSet,

    /// A group lists a field that is not defined
    #[error("group '{group}' lists unknown field '{field}'")]
    UnknownGroupField { group: String, field: String },

    /// The factory has no builder for this name
    #[error("unknown form '{name}' (looked up as '{class}')")]
    UnknownForm { name: String, class: String },
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or did not match the expected shape
    #[error("failed to load engine configuration: {source}")]
    ParseError { source: figment::Error },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::ParseError { source: error }
    }
}
