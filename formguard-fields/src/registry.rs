//! FieldRegistry: the ordered set of field definitions for one form.
//!
//! Keys are unique and keep insertion order; every grouped or listed view of a
//! form follows that order. All mutations go through checks that keep
//! `matches`/`depends` references pointing at registered fields.

use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{FieldsError, Result};
use crate::types::{DependencyCondition, FieldDefinition, PROPERTIES};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRegistry {
    fields: IndexMap<String, FieldDefinition>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(key, definition)` pairs in order.
    ///
    /// Fails on a repeated key or on a definition whose references do not
    /// resolve inside the given set.
    pub fn from_definitions<I, K>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FieldDefinition)>,
        K: Into<String>,
    {
        let mut fields = IndexMap::new();
        for (key, def) in definitions {
            let key = key.into();
            if fields.contains_key(&key) {
                return Err(FieldsError::DuplicateField { name: key });
            }
            fields.insert(key, def);
        }
        let registry = Self { fields };
        registry.check_all()?;
        Ok(registry)
    }

    /// Build a registry from an already-deserialized mapping of key → definition.
    pub fn from_value(value: Value) -> Result<Self> {
        let fields: IndexMap<String, FieldDefinition> = serde_json::from_value(value)?;
        Self::from_definitions(fields)
    }

    /// Replace every definition at once. The registry is untouched on error.
    pub fn set_definitions(&mut self, definitions: IndexMap<String, FieldDefinition>) -> Result<()> {
        let next = Self::from_definitions(definitions)?;
        debug!(fields = next.len(), "field definitions replaced");
        *self = next;
        Ok(())
    }

    /// Insert one new field at the end.
    pub fn add(&mut self, key: impl Into<String>, def: FieldDefinition) -> Result<()> {
        let key = key.into();
        if self.fields.contains_key(&key) {
            return Err(FieldsError::DuplicateField { name: key });
        }
        let mut next = self.clone();
        next.fields.insert(key.clone(), def);
        next.check(&key)?;
        debug!(field = %key, "field definition added");
        *self = next;
        Ok(())
    }

    /// Merge the properties in `patch` (a JSON object) into an existing field.
    ///
    /// A `null` property resets it to its unset form.
    pub fn change(&mut self, key: &str, patch: &Value) -> Result<()> {
        let current = self.get(key)?;
        let Some(patch) = patch.as_object() else {
            return Err(FieldsError::invalid(key, "property patch must be an object"));
        };

        let mut merged = match serde_json::to_value(current)? {
            Value::Object(map) => map,
            _ => return Err(FieldsError::invalid(key, "definition is not an object")),
        };
        for (property, value) in patch {
            if !PROPERTIES.contains(&property.as_str()) {
                return Err(FieldsError::UnknownProperty {
                    field: key.to_string(),
                    property: property.clone(),
                });
            }
            if value.is_null() {
                merged.remove(property);
            } else {
                merged.insert(property.clone(), value.clone());
            }
        }
        let def: FieldDefinition = serde_json::from_value(Value::Object(merged))?;

        let mut next = self.clone();
        next.fields.insert(key.to_string(), def);
        next.check_all()?;
        debug!(field = %key, properties = patch.len(), "field definition changed");
        *self = next;
        Ok(())
    }

    /// Clone this registry and apply `overrides` on top: existing keys are
    /// patched like [`change`](Self::change), new keys are added in order.
    pub fn extended(&self, overrides: IndexMap<String, Value>) -> Result<Self> {
        let mut next = self.clone();
        for (key, patch) in overrides {
            if next.contains(&key) {
                next.change(&key, &patch)?;
            } else {
                let def: FieldDefinition = serde_json::from_value(patch)?;
                next.add(key, def)?;
            }
        }
        Ok(next)
    }

    pub fn get(&self, key: &str) -> Result<&FieldDefinition> {
        self.fields
            .get(key)
            .ok_or_else(|| FieldsError::UnknownField {
                name: key.to_string(),
            })
    }

    /// A single property of a single field.
    pub fn property(&self, key: &str, property: &str) -> Result<Value> {
        self.get(key)?
            .property(property)?
            .ok_or_else(|| FieldsError::UnknownProperty {
                field: key.to_string(),
                property: property.to_string(),
            })
    }

    pub fn definitions(&self) -> &IndexMap<String, FieldDefinition> {
        &self.fields
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Position of a field in definition order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.fields.get_index_of(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDefinition)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// SHA-256 over the serialized definitions, hex encoded.
    ///
    /// Depends only on definition structure, never on values, so it can key
    /// caches of form metadata.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.fields)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    fn check_all(&self) -> Result<()> {
        for key in self.fields.keys() {
            self.check(key)?;
        }
        Ok(())
    }

    fn check(&self, key: &str) -> Result<()> {
        let def = self.get(key)?;
        def.check_shape(key)?;

        for (property, target) in def.references() {
            if !self.contains(&target) {
                return Err(FieldsError::UnknownReference {
                    field: key.to_string(),
                    property: property.to_string(),
                    target,
                });
            }
        }

        if let Some(dep) = def.dependency(key)? {
            let by_option = matches!(
                dep.condition,
                DependencyCondition::FirstOption | DependencyCondition::LastOption
            );
            if by_option && self.get(&dep.field)?.options.is_none() {
                return Err(FieldsError::invalid(
                    key,
                    format!("'{}' has no options to depend on", dep.field),
                ));
            }
        }
        Ok(())
    }
}
