//! Dependency Resolver: effective requiredness for one value snapshot.
//!
//! A field is required when its own `required` flag is set or when its
//! `depends*` condition holds against the other field's current value.

use std::collections::HashSet;

use formguard_fields::{DependencyCondition, FieldDefinition, FieldRegistry};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{FormError, Result};
use crate::options::OptionsResolver;
use crate::values::{is_empty, loosely_equal, option_key, ValueStore};

pub struct DependencyResolver<'a> {
    registry: &'a FieldRegistry,
    options: &'a OptionsResolver<'a>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a FieldRegistry, options: &'a OptionsResolver<'a>) -> Self {
        Self { registry, options }
    }

    /// Requiredness of every field, in definition order.
    pub fn resolve(&self, values: &ValueStore) -> Result<IndexMap<String, bool>> {
        self.check_cycles()?;
        let mut required = IndexMap::with_capacity(self.registry.len());
        for (key, def) in self.registry.iter() {
            let is_required = def.required || self.condition_holds(key, def, values)?;
            required.insert(key.clone(), is_required);
        }
        Ok(required)
    }

    /// Requiredness of a single field.
    pub fn is_required(&self, key: &str, values: &ValueStore) -> Result<bool> {
        self.check_cycles()?;
        let def = self.registry.get(key)?;
        Ok(def.required || self.condition_holds(key, def, values)?)
    }

    /// Fail on any `depends` loop, including a field depending on itself.
    ///
    /// Each field depends on at most one other, so every walk is a chain.
    pub fn check_cycles(&self) -> Result<()> {
        let mut cleared: HashSet<&str> = HashSet::new();
        for start in self.registry.keys() {
            let mut path: Vec<&str> = Vec::new();
            let mut current = start.as_str();
            loop {
                if cleared.contains(current) {
                    break;
                }
                if let Some(at) = path.iter().position(|seen| *seen == current) {
                    let mut cycle: Vec<String> = path[at..].iter().map(|k| k.to_string()).collect();
                    cycle.push(current.to_string());
                    return Err(FormError::CircularDependency { path: cycle });
                }
                path.push(current);
                match &self.registry.get(current)?.depends {
                    Some(next) => current = next.as_str(),
                    None => break,
                }
            }
            cleared.extend(path);
        }
        Ok(())
    }

    fn condition_holds(&self, key: &str, def: &FieldDefinition, values: &ValueStore) -> Result<bool> {
        let Some(dependency) = def.dependency(key)? else {
            return Ok(false);
        };
        let target_type = self.registry.get(&dependency.field)?.type_;
        let value = values.value(&dependency.field);

        let holds = match &dependency.condition {
            DependencyCondition::NotEmpty => !is_empty(target_type, value),
            DependencyCondition::Empty => is_empty(target_type, value),
            DependencyCondition::Equals(expected) => {
                !is_empty(target_type, value) && loosely_equal(value, expected)
            }
            DependencyCondition::FirstOption | DependencyCondition::LastOption => {
                let options = self.options.resolve(&dependency.field)?;
                let boundary = options.as_deref().and_then(|list| {
                    if dependency.condition == DependencyCondition::FirstOption {
                        list.keys().next().cloned()
                    } else {
                        list.keys().last().cloned()
                    }
                });
                match (boundary, option_key(value)) {
                    (Some(boundary), Some(current)) => boundary == current,
                    _ => false,
                }
            }
        };

        trace!(field = %key, depends = %dependency.field, holds, "dependency evaluated");
        Ok(holds)
    }
}
