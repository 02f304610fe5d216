//! Core field types for the registry.
//!
//! A [`FieldDefinition`] is the declarative rule set for one input field. All
//! types serialize with the property names used in form definition files, so
//! a definition loaded from YAML or JSON deserializes straight into them.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldsError, Result};

/// Prefix on a `matches` target that turns "must equal" into "must differ".
pub const NOT_EQUAL_MARKER: char = '!';

/// Ordered mapping of option value to label.
pub type OptionList = IndexMap<String, String>;

/// Every property name a definition understands, in serialization order.
pub const PROPERTIES: [&str; 20] = [
    "type",
    "type_params",
    "caption",
    "options",
    "min",
    "max",
    "required",
    "optional",
    "readonly",
    "hidden",
    "default",
    "regex",
    "matches",
    "depends",
    "depends_value",
    "depends_value_empty",
    "depends_first_option",
    "depends_last_option",
    "page",
    "tags",
];

/// The type of a field. Determines how a value is parsed and measured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Numeric,
    Scalar,
    List,
    Bool,
    #[default]
    String,
    Email,
    Ip,
    Url,
    Date,
    Datetime,
    Time,
    /// On/off toggle. An unset toggle (`false`) counts as empty.
    Switch,
}

impl FieldType {
    /// All supported types.
    pub const ALL: [FieldType; 13] = [
        FieldType::Int,
        FieldType::Numeric,
        FieldType::Scalar,
        FieldType::List,
        FieldType::Bool,
        FieldType::String,
        FieldType::Email,
        FieldType::Ip,
        FieldType::Url,
        FieldType::Date,
        FieldType::Datetime,
        FieldType::Time,
        FieldType::Switch,
    ];

    /// Get the string representation of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Numeric => "numeric",
            FieldType::Scalar => "scalar",
            FieldType::List => "list",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Email => "email",
            FieldType::Ip => "ip",
            FieldType::Url => "url",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Time => "time",
            FieldType::Switch => "switch",
        }
    }

    /// Whether `min`/`max` mean anything for this type.
    pub fn supports_bounds(&self) -> bool {
        !matches!(self, FieldType::Bool | FieldType::Switch | FieldType::Ip)
    }

    /// Whether values are chronological and limits are written in a format.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldType::Date | FieldType::Datetime | FieldType::Time
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FieldsError::UnknownType { name: s.to_string() })
    }
}

/// Where a field's allowed values come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OptionsSource {
    /// Inline value → label mapping
    Inline(OptionList),
    /// Name of a list served by the options provider
    List(String),
}

/// A `min`/`max` bound. Numbers bound magnitude, length or count; text bounds
/// temporal fields and is written in the field's format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Limit {
    Number(f64),
    Text(String),
}

impl Limit {
    /// Numeric view of the limit, parsing text when needed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Limit::Number(n) => Some(*n),
            Limit::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Limit::Number(_) => Cow::Owned(self.to_string()),
            Limit::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Limit::Number(n) => write!(f, "{n}"),
            Limit::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Limit {
    fn from(n: f64) -> Self {
        Limit::Number(n)
    }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self {
        Limit::Number(n as f64)
    }
}

impl From<i32> for Limit {
    fn from(n: i32) -> Self {
        Limit::Number(f64::from(n))
    }
}

impl From<&str> for Limit {
    fn from(s: &str) -> Self {
        Limit::Text(s.to_string())
    }
}

impl From<String> for Limit {
    fn from(s: String) -> Self {
        Limit::Text(s)
    }
}

/// Parsed form of the `matches` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub field: String,
    /// Value must differ from the other field instead of equal it
    pub negated: bool,
}

impl MatchRule {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(NOT_EQUAL_MARKER) {
            Some(rest) => MatchRule {
                field: rest.to_string(),
                negated: true,
            },
            None => MatchRule {
                field: raw.to_string(),
                negated: false,
            },
        }
    }
}

/// When a `depends` rule makes a field required.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyCondition {
    /// The other field is non-empty
    NotEmpty,
    /// The other field equals this literal
    Equals(Value),
    /// The other field is empty or unset
    Empty,
    /// The other field holds the first key of its options
    FirstOption,
    /// The other field holds the last key of its options
    LastOption,
}

/// Parsed form of the `depends*` properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub field: String,
    pub condition: DependencyCondition,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A field definition: the complete rule set for a single named input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    #[serde(rename = "type", default)]
    pub type_: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Limit>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// Absent from bulk input without raising a missing-field error
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_value: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub depends_value_empty: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub depends_first_option: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub depends_last_option: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub tags: IndexSet<String>,
}

impl FieldDefinition {
    /// Create a definition of the given type with every rule unset
    pub fn new(type_: FieldType) -> Self {
        Self {
            type_,
            ..Self::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_type_params(mut self, params: Value) -> Self {
        self.type_params = Some(params);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_min(mut self, min: impl Into<Limit>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<Limit>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Set inline options, keeping the given order
    pub fn with_options<I, K, L>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        let list = options
            .into_iter()
            .map(|(k, l)| (k.into(), l.into()))
            .collect();
        self.options = Some(OptionsSource::Inline(list));
        self
    }

    /// Reference a list served by the options provider
    pub fn with_options_list(mut self, name: impl Into<String>) -> Self {
        self.options = Some(OptionsSource::List(name.into()));
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Value must equal the named field's value
    pub fn matching(mut self, field: impl Into<String>) -> Self {
        self.matches = Some(field.into());
        self
    }

    /// Value must differ from the named field's value
    pub fn not_matching(mut self, field: impl AsRef<str>) -> Self {
        self.matches = Some(format!("{NOT_EQUAL_MARKER}{}", field.as_ref()));
        self
    }

    pub fn depends_on(mut self, field: impl Into<String>) -> Self {
        self.depends = Some(field.into());
        self
    }

    pub fn when_value(mut self, value: Value) -> Self {
        self.depends_value = Some(value);
        self
    }

    pub fn when_empty(mut self) -> Self {
        self.depends_value_empty = true;
        self
    }

    pub fn when_first_option(mut self) -> Self {
        self.depends_first_option = true;
        self
    }

    pub fn when_last_option(mut self) -> Self {
        self.depends_last_option = true;
        self
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Writable fields accept input from the user-facing setters.
    pub fn is_writable(&self) -> bool {
        !self.readonly && !self.hidden
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Caption token, falling back to the field key.
    pub fn caption_or<'a>(&'a self, key: &'a str) -> &'a str {
        self.caption.as_deref().unwrap_or(key)
    }

    pub fn match_rule(&self) -> Option<MatchRule> {
        self.matches.as_deref().map(MatchRule::parse)
    }

    /// The parsed `depends*` rule, if any.
    ///
    /// `key` names this field in the error returned for conflicting rules.
    pub fn dependency(&self, key: &str) -> Result<Option<Dependency>> {
        let mut conditions = Vec::new();
        if let Some(value) = &self.depends_value {
            conditions.push(DependencyCondition::Equals(value.clone()));
        }
        if self.depends_value_empty {
            conditions.push(DependencyCondition::Empty);
        }
        if self.depends_first_option {
            conditions.push(DependencyCondition::FirstOption);
        }
        if self.depends_last_option {
            conditions.push(DependencyCondition::LastOption);
        }

        let Some(field) = &self.depends else {
            if conditions.is_empty() {
                return Ok(None);
            }
            return Err(FieldsError::ConflictingDependency {
                field: key.to_string(),
            });
        };

        if conditions.len() > 1 {
            return Err(FieldsError::ConflictingDependency {
                field: key.to_string(),
            });
        }

        Ok(Some(Dependency {
            field: field.clone(),
            condition: conditions.pop().unwrap_or(DependencyCondition::NotEmpty),
        }))
    }

    /// Look up one property by name; unset properties come back as their
    /// empty form (`null`, `false` or `[]`).
    pub fn property(&self, name: &str) -> Result<Option<Value>> {
        if !PROPERTIES.contains(&name) {
            return Ok(None);
        }
        let full = serde_json::to_value(self)?;
        let value = full.get(name).cloned().unwrap_or(match name {
            "required" | "optional" | "readonly" | "hidden" | "depends_value_empty"
            | "depends_first_option" | "depends_last_option" => Value::Bool(false),
            "tags" => Value::Array(Vec::new()),
            _ => Value::Null,
        });
        Ok(Some(value))
    }

    /// Check everything that can be checked without the rest of the registry.
    pub fn check_shape(&self, key: &str) -> Result<()> {
        if self.page == Some(0) {
            return Err(FieldsError::invalid(key, "page must be a positive integer"));
        }
        if let Some(pattern) = &self.regex {
            Regex::new(pattern)
                .map_err(|e| FieldsError::invalid(key, format!("bad regex: {e}")))?;
        }
        if self.type_.supports_bounds() && !self.type_.is_temporal() {
            for limit in [&self.min, &self.max].into_iter().flatten() {
                if limit.as_number().is_none() {
                    return Err(FieldsError::invalid(
                        key,
                        format!("limit '{limit}' cannot bound a {} value", self.type_),
                    ));
                }
            }
            let min = self.min.as_ref().and_then(Limit::as_number);
            let max = self.max.as_ref().and_then(Limit::as_number);
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(FieldsError::invalid(key, format!("min {min} exceeds max {max}")));
                }
            }
        }
        if let Some(rule) = self.match_rule() {
            if rule.field.is_empty() {
                return Err(FieldsError::invalid(key, "matches needs a field name"));
            }
        }
        self.dependency(key)?;
        Ok(())
    }

    /// Fields this definition points at, paired with the property naming them.
    pub fn references(&self) -> Vec<(&'static str, String)> {
        let mut refs = Vec::new();
        if let Some(rule) = self.match_rule() {
            refs.push(("matches", rule.field));
        }
        if let Some(field) = &self.depends {
            refs.push(("depends", field.clone()));
        }
        refs
    }
}
