//! Whitelist form validation engine
//!
//! `formguard` accepts untrusted key/value input for a declared set of fields
//! and either accepts it or reports every rule it breaks. Only values that
//! satisfy their field's rules pass; everything else is rejected.
//!
//! # Architecture
//!
//! - [`formguard_fields::FieldRegistry`] holds the field definitions
//! - [`ValueStore`] holds current values and whether each was supplied
//! - [`DependencyResolver`] decides which fields are required right now
//! - [`ConstraintEvaluator`] runs type, bound, option, pattern and match checks
//! - [`ErrorAggregator`] keeps translated errors in field order
//! - [`view`] renders JSON-safe projections
//!
//! Translation and option lists are injected through the [`Translator`] and
//! [`OptionsProvider`] traits.
//!
//! # Example
//!
//! ```
//! use formguard::{FieldDefinition, FieldRegistry, FieldType, Form};
//! use serde_json::json;
//!
//! let registry = FieldRegistry::from_definitions([
//!     ("email", FieldDefinition::new(FieldType::Email).required()),
//!     ("age", FieldDefinition::new(FieldType::Int).with_min(18)),
//! ])?;
//! let mut form = Form::new(registry)?;
//! form.set_all_values(serde_json::from_value(json!({ "email": "x", "age": 16 }))?)?;
//!
//! assert!(!form.validate()?);
//! assert_eq!(form.errors()?.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregator;
pub mod config;
pub mod constraints;
pub mod dependency;
pub mod error;
pub mod factory;
pub mod form;
pub mod kinds;
pub mod options;
pub mod translator;
pub mod values;
pub mod view;

pub use aggregator::{ErrorAggregator, ErrorsByPage, ValidationError};
pub use config::EngineConfig;
pub use constraints::{CompiledRules, ConstraintEvaluator, Violation, ViolationCode};
pub use dependency::DependencyResolver;
pub use error::{ConfigError, FormError, Result};
pub use factory::FormFactory;
pub use form::{Form, FormBuilder};
pub use options::{OptionsProvider, OptionsResolver, StaticOptions};
pub use translator::{MessageCatalog, PassthroughTranslator, TranslationParams, Translator};
pub use values::{FormValue, ValueStore, Values};
pub use view::{FieldView, Groups};

pub use formguard_fields::{FieldDefinition, FieldRegistry, FieldType, FieldsError, Limit};
