//! Field definition model and registry
//!
//! `formguard-fields` is a schema-only crate: it owns the declarative rule set
//! of a form and knows nothing about submitted values, translation or
//! rendering. The engine in `formguard` consumes it.
//!
//! # Architecture
//!
//! - **Declarative**: one [`FieldDefinition`] per field, serde-compatible with
//!   YAML/JSON definition files
//! - **Ordered**: [`FieldRegistry`] keeps insertion order for every projection
//! - **Checked**: references between fields are resolved when definitions are
//!   set, added or changed, never at request time
//! - **Fingerprinted**: [`FieldRegistry::fingerprint`] identifies a form shape

pub mod error;
pub mod registry;
pub mod types;

pub use error::{FieldsError, Result};
pub use registry::FieldRegistry;
pub use types::{
    Dependency, DependencyCondition, FieldDefinition, FieldType, Limit, MatchRule, OptionList,
    OptionsSource, NOT_EQUAL_MARKER, PROPERTIES,
};
