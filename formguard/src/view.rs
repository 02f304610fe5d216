//! View Projector: JSON-safe renderings of definitions, options and values.

use std::collections::BTreeMap;

use formguard_fields::{FieldDefinition, FieldRegistry, FieldType, Limit, OptionList};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FormError, Result};
use crate::values::{ValueStore, Values};

/// Field groups for grouped projections: group name → ordered field keys.
pub type Groups = IndexMap<String, Vec<String>>;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Everything a client needs to render or pre-validate one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    /// Translated caption
    pub caption: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_params: Option<Value>,
    /// Effective requiredness for the current values
    pub required: bool,
    pub optional: bool,
    pub readonly: bool,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_value: Option<Value>,
    #[serde(skip_serializing_if = "is_false")]
    pub depends_value_empty: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub depends_first_option: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub depends_last_option: bool,
    pub page: Option<u32>,
    pub tags: Vec<String>,
    /// Materialized options, named lists included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub value: Value,
}

impl FieldView {
    pub fn new(
        def: &FieldDefinition,
        caption: String,
        required: bool,
        options: Option<OptionList>,
        value: Value,
    ) -> Self {
        Self {
            caption,
            type_: def.type_,
            type_params: def.type_params.clone(),
            required,
            optional: def.optional,
            readonly: def.readonly,
            hidden: def.hidden,
            min: def.min.clone(),
            max: def.max.clone(),
            regex: def.regex.clone(),
            matches: def.matches.clone(),
            depends: def.depends.clone(),
            depends_value: def.depends_value.clone(),
            depends_value_empty: def.depends_value_empty,
            depends_first_option: def.depends_first_option,
            depends_last_option: def.depends_last_option,
            page: def.page,
            tags: def.tags.iter().cloned().collect(),
            options,
            default: def.default.clone(),
            value,
        }
    }
}

/// Every field must be registered.
pub fn check_groups(registry: &FieldRegistry, groups: &Groups) -> Result<()> {
    for (group, fields) in groups {
        if let Some(field) = fields.iter().find(|field| !registry.contains(field)) {
            return Err(FormError::UnknownGroupField {
                group: group.clone(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}

/// Current values bucketed by page; each field lands in exactly one bucket.
pub fn values_by_page(registry: &FieldRegistry, values: &ValueStore) -> BTreeMap<Option<u32>, Values> {
    let mut pages: BTreeMap<Option<u32>, Values> = BTreeMap::new();
    for (key, def) in registry.iter() {
        pages
            .entry(def.page)
            .or_default()
            .insert(key.clone(), values.value(key).clone());
    }
    pages
}

/// Current values of fields carrying `tag`, in field order.
pub fn values_by_tag(registry: &FieldRegistry, values: &ValueStore, tag: &str) -> Values {
    registry
        .iter()
        .filter(|(_, def)| def.has_tag(tag))
        .map(|(key, _)| (key.clone(), values.value(key).clone()))
        .collect()
}
