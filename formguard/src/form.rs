//! The form: one registry, its values and the errors of the last pass.
//!
//! A [`Form`] is meant for one validation subject at a time. It does no
//! internal locking; share it across threads only behind your own
//! synchronization, or build one per request.

use std::collections::BTreeMap;
use std::sync::Arc;

use formguard_fields::{FieldDefinition, FieldRegistry};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::aggregator::{ErrorAggregator, ErrorsByPage, ValidationError};
use crate::config::EngineConfig;
use crate::constraints::{CompiledRules, ConstraintEvaluator};
use crate::dependency::DependencyResolver;
use crate::error::{FormError, Result};
use crate::options::{OptionsProvider, OptionsResolver, StaticOptions};
use crate::translator::{MessageCatalog, TranslationParams, Translator};
use crate::values::{ValueStore, Values};
use crate::view::{self, FieldView, Groups};

/// Builder for [`Form`] with injected collaborators.
pub struct FormBuilder {
    name: String,
    registry: FieldRegistry,
    translator: Arc<dyn Translator>,
    options: Arc<dyn OptionsProvider>,
    config: Arc<EngineConfig>,
    groups: Option<Groups>,
}

impl FormBuilder {
    pub fn new(registry: FieldRegistry) -> Self {
        Self {
            name: "form".to_string(),
            registry,
            translator: Arc::new(MessageCatalog::english()),
            options: Arc::new(StaticOptions::new()),
            config: Arc::new(EngineConfig::default()),
            groups: None,
        }
    }

    /// Name used in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn options(mut self, options: Arc<dyn OptionsProvider>) -> Self {
        self.options = options;
        self
    }

    pub fn config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn groups(mut self, groups: Groups) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Fails when a group lists an unknown field or a limit cannot be read
    /// in its field's format.
    pub fn build(self) -> Result<Form> {
        if let Some(groups) = &self.groups {
            view::check_groups(&self.registry, groups)?;
        }
        let rules = CompiledRules::compile(&self.registry, &self.config)?;
        let values = ValueStore::from_registry(&self.registry);
        Ok(Form {
            name: self.name,
            registry: self.registry,
            rules,
            values,
            errors: ErrorAggregator::new(),
            groups: self.groups,
            translator: self.translator,
            options: self.options,
            config: self.config,
        })
    }
}

pub struct Form {
    name: String,
    registry: FieldRegistry,
    rules: CompiledRules,
    values: ValueStore,
    errors: ErrorAggregator,
    groups: Option<Groups>,
    translator: Arc<dyn Translator>,
    options: Arc<dyn OptionsProvider>,
    config: Arc<EngineConfig>,
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.name)
            .field("fields", &self.registry.len())
            .field("validated", &self.errors.is_validated())
            .finish_non_exhaustive()
    }
}

impl Form {
    /// A form with the [`FormBuilder`] defaults: the English message catalog,
    /// no option lists and default configuration.
    pub fn new(registry: FieldRegistry) -> Result<Self> {
        FormBuilder::new(registry).build()
    }

    pub fn builder(registry: FieldRegistry) -> FormBuilder {
        FormBuilder::new(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Definitions

    /// Replace every definition.
    pub fn set_definition(&mut self, definitions: IndexMap<String, FieldDefinition>) -> Result<()> {
        let mut registry = self.registry.clone();
        registry.set_definitions(definitions)?;
        self.commit(registry)
    }

    /// Add one field; fails on an existing key.
    pub fn add_definition(&mut self, key: impl Into<String>, def: FieldDefinition) -> Result<()> {
        let mut registry = self.registry.clone();
        registry.add(key, def)?;
        self.commit(registry)
    }

    /// Merge the properties of `patch` into an existing field.
    pub fn change_definition(&mut self, key: &str, patch: &Value) -> Result<()> {
        let mut registry = self.registry.clone();
        registry.change(key, patch)?;
        self.commit(registry)
    }

    /// Swap in changed definitions once their rules compile. The form stays
    /// untouched on error.
    fn commit(&mut self, registry: FieldRegistry) -> Result<()> {
        self.rules = CompiledRules::compile(&registry, &self.config)?;
        self.registry = registry;
        self.values.sync(&self.registry);
        self.errors.clear();
        Ok(())
    }

    pub fn definitions(&self) -> &IndexMap<String, FieldDefinition> {
        self.registry.definitions()
    }

    pub fn definition(&self, key: &str) -> Result<&FieldDefinition> {
        Ok(self.registry.get(key)?)
    }

    pub fn definition_property(&self, key: &str, property: &str) -> Result<Value> {
        Ok(self.registry.property(key, property)?)
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Configure groups for [`as_grouped_array`](Self::as_grouped_array).
    pub fn set_groups(&mut self, groups: Groups) -> Result<()> {
        view::check_groups(&self.registry, &groups)?;
        self.groups = Some(groups);
        Ok(())
    }

    // Values

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        self.registry.get(key)?;
        self.values.set(key, value, false);
        Ok(())
    }

    pub fn value(&self, key: &str) -> Result<&Value> {
        self.registry.get(key)?;
        Ok(self.values.value(key))
    }

    /// All current values in field order.
    pub fn values(&self) -> Values {
        self.values.snapshot()
    }

    /// Whether the caller set `key`, as opposed to it holding its default.
    pub fn is_supplied(&self, key: &str) -> Result<bool> {
        self.registry.get(key)?;
        Ok(self.values.is_supplied(key))
    }

    /// Set every given value. Any unknown key fails the whole call.
    pub fn set_all_values(&mut self, values: Values) -> Result<()> {
        self.reject_unknown(&values)?;
        self.apply(values, false);
        Ok(())
    }

    /// Set the given values of registered fields. Every non-optional field
    /// must be present; unknown keys are ignored.
    pub fn set_defined_values(&mut self, values: Values) -> Result<()> {
        self.require_present(&values, |_| true)?;
        let accepted = self.retain(values, |_| true);
        self.apply(accepted, false);
        Ok(())
    }

    /// Set values of writable fields. Unknown keys fail the whole call;
    /// readonly and hidden fields are skipped.
    pub fn set_writable_values(&mut self, values: Values) -> Result<()> {
        self.reject_unknown(&values)?;
        let accepted = self.retain(values, FieldDefinition::is_writable);
        self.apply(accepted, true);
        Ok(())
    }

    /// Set values of writable fields. Every non-optional writable field must
    /// be present; unknown keys are ignored.
    pub fn set_defined_writable_values(&mut self, values: Values) -> Result<()> {
        self.require_present(&values, FieldDefinition::is_writable)?;
        let accepted = self.retain(values, FieldDefinition::is_writable);
        self.apply(accepted, true);
        Ok(())
    }

    /// Like [`set_defined_writable_values`](Self::set_defined_writable_values)
    /// restricted to fields on `page`. Values of every other field stay as
    /// they are.
    pub fn set_writable_values_on_page(&mut self, values: Values, page: u32) -> Result<()> {
        let on_page = |def: &FieldDefinition| def.is_writable() && def.page == Some(page);
        self.require_present(&values, on_page)?;
        let accepted = self.retain(values, on_page);
        self.apply(accepted, true);
        Ok(())
    }

    fn reject_unknown(&self, values: &Values) -> Result<()> {
        for key in values.keys() {
            self.registry.get(key)?;
        }
        Ok(())
    }

    fn require_present(&self, values: &Values, applies: impl Fn(&FieldDefinition) -> bool) -> Result<()> {
        for (key, def) in self.registry.iter() {
            if applies(def) && !def.optional && !values.contains_key(key) {
                return Err(FormError::MissingField { name: key.clone() });
            }
        }
        Ok(())
    }

    fn retain(&self, values: Values, applies: impl Fn(&FieldDefinition) -> bool) -> Values {
        values
            .into_iter()
            .filter(|(key, _)| self.registry.get(key).is_ok_and(&applies))
            .collect()
    }

    fn apply(&mut self, values: Values, writable: bool) {
        for (key, value) in values {
            trace!(form = %self.name, field = %key, writable, "value set");
            self.values.set(&key, value, writable);
        }
    }

    // Validation

    /// Run a full validation pass, replacing the errors of any earlier pass.
    ///
    /// Returns whether the values are valid. `Err` means the definitions are
    /// broken (circular dependency, unknown options list, unusable limit).
    pub fn validate(&mut self) -> Result<bool> {
        let found = {
            let options = OptionsResolver::new(&self.registry, self.options.as_ref());
            let required = DependencyResolver::new(&self.registry, &options).resolve(&self.values)?;
            let evaluator =
                ConstraintEvaluator::new(&self.registry, &self.rules, &options, &self.config);

            let mut found = Vec::new();
            for (key, is_required) in &required {
                for violation in evaluator.evaluate(key, *is_required, &self.values)? {
                    found.push((key.clone(), violation));
                }
            }
            found
        };

        self.errors.clear();
        for (key, violation) in found {
            self.record(&key, violation.code.token(), violation.params)?;
        }
        self.errors.mark_validated();

        let valid = !self.errors.has_errors();
        debug!(
            form = %self.name,
            fields = self.registry.len(),
            errors = self.errors.errors()?.len(),
            valid,
            "validation finished"
        );
        Ok(valid)
    }

    /// Attach an error to `key` from outside the rule set, e.g. a failed
    /// uniqueness check. `%caption%` is filled in automatically.
    pub fn add_error(&mut self, key: &str, token: &str, params: TranslationParams) -> Result<()> {
        self.record(key, token, params)
    }

    fn record(&mut self, key: &str, token: &str, mut params: TranslationParams) -> Result<()> {
        let def = self.registry.get(key)?;
        let position = self.registry.position(key).unwrap_or(usize::MAX);
        let empty = TranslationParams::new();

        params.insert(
            "caption".to_string(),
            self.translator.translate(def.caption_or(key), &empty),
        );
        if let Some(other) = params.get_mut("other") {
            *other = self.translator.translate(other, &empty);
        }
        let message = self.translator.translate(token, &params);

        trace!(form = %self.name, field = %key, token, "validation error recorded");
        self.errors.add(
            position,
            ValidationError {
                field: key.to_string(),
                token: token.to_string(),
                message,
                page: def.page,
                params,
            },
        );
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// Fails with [`FormError::ValidationNotRun`] before the first pass.
    pub fn is_valid(&self) -> Result<bool> {
        self.errors.is_valid()
    }

    pub fn errors(&self) -> Result<Vec<&ValidationError>> {
        self.errors.errors()
    }

    pub fn errors_by_page(&self) -> Result<ErrorsByPage<'_>> {
        self.errors.errors_by_page()
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first_error()
    }

    /// Human-readable listing of all errors grouped by page.
    pub fn errors_as_text(&self) -> Result<String> {
        let captions = self
            .registry
            .iter()
            .map(|(key, def)| (key.clone(), self.caption(key, def)))
            .collect();
        self.errors.as_text(&self.config, &captions)
    }

    /// Forget all errors; values stay untouched.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Restore default values and clear errors, ready for the next subject.
    pub fn reset(&mut self) {
        self.values.reset(&self.registry);
        self.errors.clear();
        debug!(form = %self.name, "form reset");
    }

    // Requiredness

    /// Effective requiredness of `key` for the current values.
    pub fn is_required(&self, key: &str) -> Result<bool> {
        let options = OptionsResolver::new(&self.registry, self.options.as_ref());
        DependencyResolver::new(&self.registry, &options).is_required(key, &self.values)
    }

    /// Keys of all currently required fields, in field order.
    pub fn required_fields(&self) -> Result<Vec<String>> {
        Ok(self
            .requiredness()?
            .into_iter()
            .filter_map(|(key, required)| required.then_some(key))
            .collect())
    }

    fn requiredness(&self) -> Result<IndexMap<String, bool>> {
        let options = OptionsResolver::new(&self.registry, self.options.as_ref());
        DependencyResolver::new(&self.registry, &options).resolve(&self.values)
    }

    // Projection

    fn caption(&self, key: &str, def: &FieldDefinition) -> String {
        self.translator
            .translate(def.caption_or(key), &TranslationParams::new())
    }

    fn view(
        &self,
        key: &str,
        options: &OptionsResolver<'_>,
        required: &IndexMap<String, bool>,
    ) -> Result<FieldView> {
        let def = self.registry.get(key)?;
        Ok(FieldView::new(
            def,
            self.caption(key, def),
            required.get(key).copied().unwrap_or(def.required),
            options.resolve(key)?.map(|list| list.into_owned()),
            self.values.value(key).clone(),
        ))
    }

    /// JSON-safe view of one field.
    pub fn field_as_array(&self, key: &str) -> Result<FieldView> {
        let required = self.requiredness()?;
        let options = OptionsResolver::new(&self.registry, self.options.as_ref());
        self.view(key, &options, &required)
    }

    /// JSON-safe view of every field in field order.
    pub fn as_array(&self) -> Result<IndexMap<String, FieldView>> {
        let required = self.requiredness()?;
        let options = OptionsResolver::new(&self.registry, self.options.as_ref());
        let mut views = IndexMap::with_capacity(self.registry.len());
        for key in self.registry.keys() {
            views.insert(key.clone(), self.view(key, &options, &required)?);
        }
        Ok(views)
    }

    /// Field views arranged by the configured groups.
    pub fn as_grouped_array(&self) -> Result<IndexMap<String, IndexMap<String, FieldView>>> {
        let groups = self.groups.as_ref().ok_or(FormError::GroupsNotSet)?;
        view::check_groups(&self.registry, groups)?;
        let required = self.requiredness()?;
        let options = OptionsResolver::new(&self.registry, self.options.as_ref());

        let mut grouped = IndexMap::with_capacity(groups.len());
        for (group, keys) in groups {
            let mut views = IndexMap::with_capacity(keys.len());
            for key in keys {
                views.insert(key.clone(), self.view(key, &options, &required)?);
            }
            grouped.insert(group.clone(), views);
        }
        Ok(grouped)
    }

    /// Current values bucketed by page; unpaged fields come first.
    pub fn values_by_page(&self) -> BTreeMap<Option<u32>, Values> {
        view::values_by_page(&self.registry, &self.values)
    }

    /// Current values of fields tagged `tag`.
    pub fn values_by_tag(&self, tag: &str) -> Values {
        view::values_by_tag(&self.registry, &self.values, tag)
    }

    /// Fingerprint of the definition structure, independent of values.
    pub fn hash(&self) -> Result<String> {
        Ok(self.registry.fingerprint()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::PassthroughTranslator;
    use formguard_fields::FieldType;
    use serde_json::json;

    fn values(pairs: Value) -> Values {
        serde_json::from_value(pairs).unwrap()
    }

    fn signup() -> Form {
        let registry = FieldRegistry::from_definitions([
            (
                "username",
                FieldDefinition::new(FieldType::String)
                    .with_caption("Username")
                    .required()
                    .with_min(3),
            ),
            ("password", FieldDefinition::new(FieldType::String).required()),
            (
                "password_again",
                FieldDefinition::new(FieldType::String).matching("password"),
            ),
            (
                "newsletter",
                FieldDefinition::new(FieldType::Switch).optional(),
            ),
            (
                "created",
                FieldDefinition::new(FieldType::Date).readonly().optional(),
            ),
        ])
        .unwrap();
        Form::new(registry).unwrap()
    }

    #[test_log::test]
    fn test_validate_collects_all_violations() {
        let mut form = signup();
        form.set_all_values(values(json!({
            "username": "al",
            "password_again": "x"
        })))
        .unwrap();

        assert!(!form.validate().unwrap());
        let errors = form.errors().unwrap();
        let found: Vec<_> = errors
            .iter()
            .map(|e| (e.field.as_str(), e.token.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("username", "form.too_small"),
                ("password", "form.required"),
                ("password_again", "form.mismatch"),
            ]
        );
        assert_eq!(errors[0].message, "Username must be at least 3");
        assert_eq!(errors[2].message, "password_again must match password");
    }

    #[test]
    fn test_valid_form() {
        let mut form = signup();
        form.set_all_values(values(json!({
            "username": "alice",
            "password": "secret",
            "password_again": "secret"
        })))
        .unwrap();
        assert!(form.validate().unwrap());
        assert!(form.is_valid().unwrap());
        assert!(form.first_error().is_none());
    }

    #[test]
    fn test_set_all_values_is_atomic() {
        let mut form = signup();
        let err = form
            .set_all_values(values(json!({ "username": "alice", "nickname": "al" })))
            .unwrap_err();
        assert!(matches!(err, FormError::Fields(_)));
        assert_eq!(form.value("username").unwrap(), &Value::Null);
    }

    #[test]
    fn test_set_writable_values_skips_readonly() {
        let mut form = signup();
        form.set_writable_values(values(json!({
            "username": "alice",
            "created": "2020-01-01"
        })))
        .unwrap();
        assert_eq!(form.value("username").unwrap(), &json!("alice"));
        assert_eq!(form.value("created").unwrap(), &Value::Null);
        assert!(form
            .set_writable_values(values(json!({ "unknown": 1 })))
            .is_err());
    }

    #[test]
    fn test_set_defined_writable_values_requires_writable_fields() {
        let mut form = signup();
        let err = form
            .set_defined_writable_values(values(json!({ "username": "alice" })))
            .unwrap_err();
        assert!(matches!(err, FormError::MissingField { name } if name == "password"));

        form.set_defined_writable_values(values(json!({
            "username": "alice",
            "password": "x",
            "password_again": "x",
            "ignored": true
        })))
        .unwrap();
        assert!(form.is_supplied("password").unwrap());
        assert!(!form.is_supplied("newsletter").unwrap());
    }

    #[test]
    fn test_add_error_translates_caption() {
        let mut form = signup();
        form.validate().unwrap();
        form.add_error("username", "%caption% is taken", TranslationParams::new())
            .unwrap();
        let errors = form.errors().unwrap();
        let username: Vec<_> = errors
            .iter()
            .filter(|e| e.field == "username")
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(username, vec!["Username is required", "Username is taken"]);
        assert_eq!(errors.last().map(|e| e.field.as_str()), Some("password"));
        assert!(form.add_error("nope", "x", TranslationParams::new()).is_err());
    }

    #[test]
    fn test_definition_changes_clear_errors_and_sync_values() {
        let mut form = signup();
        form.validate().unwrap();
        assert!(form.has_errors());

        form.add_definition(
            "country",
            FieldDefinition::new(FieldType::String).with_default(json!("de")),
        )
        .unwrap();
        assert!(!form.has_errors());
        assert!(matches!(form.errors(), Err(FormError::ValidationNotRun)));
        assert_eq!(form.value("country").unwrap(), &json!("de"));

        form.change_definition("password", &json!({ "required": false }))
            .unwrap();
        assert_eq!(form.definition_property("password", "required").unwrap(), json!(false));
    }

    #[test]
    fn test_unreadable_limit_is_rejected_when_set() {
        let mut form = signup();
        form.set_value("username", json!("alice")).unwrap();

        let err = form
            .change_definition("created", &json!({ "max": "31.12.2024" }))
            .unwrap_err();
        assert!(matches!(
            err,
            FormError::Fields(formguard_fields::FieldsError::InvalidDefinition { field, .. }) if field == "created"
        ));
        assert_eq!(form.definition("created").unwrap().max, None);
        assert_eq!(form.value("username").unwrap(), &json!("alice"));

        let registry = FieldRegistry::from_definitions([(
            "from",
            FieldDefinition::new(FieldType::Date).with_min("yesterday"),
        )])
        .unwrap();
        assert!(Form::new(registry).is_err());
    }

    #[test]
    fn test_changed_regex_takes_effect() {
        let mut form = signup();
        form.set_all_values(values(json!({
            "username": "alice",
            "password": "correct horse",
            "password_again": "correct horse"
        })))
        .unwrap();
        assert!(form.validate().unwrap());

        form.change_definition("username", &json!({ "regex": "^[A-Z]" }))
            .unwrap();
        assert!(!form.validate().unwrap());
        assert_eq!(
            form.first_error().map(|e| e.token.as_str()),
            Some("form.pattern_mismatch")
        );
    }

    #[test]
    fn test_reset_restores_defaults_and_clears_errors() {
        let mut form = signup();
        form.set_value("username", json!("alice")).unwrap();
        form.validate().unwrap();
        form.reset();
        assert_eq!(form.value("username").unwrap(), &Value::Null);
        assert!(!form.has_errors());
        assert!(form.is_valid().is_err());
    }

    #[test]
    fn test_required_fields() {
        let registry = FieldRegistry::from_definitions([
            ("a", FieldDefinition::new(FieldType::String).required()),
            ("b", FieldDefinition::new(FieldType::String)),
            ("c", FieldDefinition::new(FieldType::String).depends_on("b")),
        ])
        .unwrap();
        let mut form = Form::new(registry).unwrap();
        assert_eq!(form.required_fields().unwrap(), vec!["a"]);
        form.set_value("b", json!("x")).unwrap();
        assert_eq!(form.required_fields().unwrap(), vec!["a", "c"]);
        assert!(form.is_required("c").unwrap());
    }

    #[test]
    fn test_errors_as_text() {
        let registry = FieldRegistry::from_definitions([
            (
                "name",
                FieldDefinition::new(FieldType::String)
                    .with_caption("Name")
                    .required(),
            ),
            (
                "zip",
                FieldDefinition::new(FieldType::String)
                    .with_caption("Zip")
                    .required()
                    .on_page(2),
            ),
        ])
        .unwrap();
        let mut form = Form::builder(registry)
            .name("address")
            .translator(Arc::new(PassthroughTranslator))
            .build()
            .unwrap();
        form.validate().unwrap();
        assert_eq!(
            form.errors_as_text().unwrap(),
            "General\n  Name: form.required\nPage 2\n  Zip: form.required\n"
        );
    }

    #[test]
    fn test_grouped_array_needs_groups() {
        let mut form = signup();
        assert!(matches!(form.as_grouped_array(), Err(FormError::GroupsNotSet)));

        let mut groups = Groups::new();
        groups.insert(
            "credentials".into(),
            vec!["password".into(), "password_again".into()],
        );
        form.set_groups(groups).unwrap();
        let grouped = form.as_grouped_array().unwrap();
        assert_eq!(
            grouped["credentials"].keys().collect::<Vec<_>>(),
            vec!["password", "password_again"]
        );

        let mut bad = Groups::new();
        bad.insert("x".into(), vec!["missing".into()]);
        assert!(form.set_groups(bad).is_err());
    }

    #[test]
    fn test_builder_rejects_unknown_group_field() {
        let mut groups = Groups::new();
        groups.insert("g".into(), vec!["nope".into()]);
        let result = Form::builder(FieldRegistry::new()).groups(groups).build();
        assert!(matches!(result, Err(FormError::UnknownGroupField { .. })));
    }
}
