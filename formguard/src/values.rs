//! Value Store: current values of every field in a form.
//!
//! Each field always has an entry. An entry remembers whether the caller ever
//! supplied it (as opposed to it holding its default) and whether it came in
//! through a writable setter.

use formguard_fields::{FieldRegistry, FieldType};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Ordered field → value mapping, the shape used for input and snapshots.
pub type Values = IndexMap<String, Value>;

static UNSET: Value = Value::Null;

/// The stored state of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormValue {
    /// `null` when unset
    pub value: Value,
    /// Set by the caller rather than defaulted
    pub supplied: bool,
    /// Last set through a writable setter
    pub writable: bool,
}

impl FormValue {
    fn defaulted(default: Option<&Value>) -> Self {
        Self {
            value: default.cloned().unwrap_or(Value::Null),
            supplied: false,
            writable: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStore {
    entries: IndexMap<String, FormValue>,
}

impl ValueStore {
    /// One defaulted entry per registered field.
    pub fn from_registry(registry: &FieldRegistry) -> Self {
        let entries = registry
            .iter()
            .map(|(key, def)| (key.clone(), FormValue::defaulted(def.default.as_ref())))
            .collect();
        Self { entries }
    }

    /// Follow a definition change: keep entries of surviving fields, default
    /// new ones, drop removed ones, adopt registry order.
    pub fn sync(&mut self, registry: &FieldRegistry) {
        let mut entries = IndexMap::with_capacity(registry.len());
        for (key, def) in registry.iter() {
            let entry = self
                .entries
                .swap_remove(key)
                .unwrap_or_else(|| FormValue::defaulted(def.default.as_ref()));
            entries.insert(key.clone(), entry);
        }
        self.entries = entries;
    }

    /// Back to defaults for every field.
    pub fn reset(&mut self, registry: &FieldRegistry) {
        *self = Self::from_registry(registry);
    }

    /// Store a value. Callers check the key against the registry first.
    pub fn set(&mut self, key: &str, value: Value, writable: bool) {
        self.entries.insert(
            key.to_string(),
            FormValue {
                value,
                supplied: true,
                writable,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.entries.get(key)
    }

    /// Current value of `key`, `null` when unset or unknown.
    pub fn value(&self, key: &str) -> &Value {
        self.entries.get(key).map_or(&UNSET, |entry| &entry.value)
    }

    pub fn is_supplied(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.supplied)
    }

    /// Plain copy of all current values in field order.
    pub fn snapshot(&self) -> Values {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormValue)> {
        self.entries.iter()
    }
}

/// Whether `value` counts as "nothing entered" for a field of `field_type`.
///
/// `null`, blank strings, empty lists and empty objects are empty for every
/// type; a `switch` that is off is empty too, in any spelling [`parse_bool`]
/// reads as off.
pub fn is_empty(field_type: FieldType, value: &Value) -> bool {
    if field_type == FieldType::Switch && parse_bool(value) == Some(false) {
        return true;
    }
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Read an on/off value the way form transports send them: booleans, `0`/`1`
/// and the usual words.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The options key a scalar value selects.
pub fn option_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

/// Equality that treats `1`, `"1"` and `true` alike, since transports rarely
/// preserve scalar types. Non-scalars compare structurally.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (option_key(a), option_key(b)) {
        (Some(left), Some(right)) => left == right,
        _ => a == b,
    }
}
