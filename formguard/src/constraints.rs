//! Constraint Evaluator: per-field checks for one value snapshot.

use std::cmp::Ordering;
use std::fmt;

use formguard_fields::{FieldDefinition, FieldRegistry, FieldType, FieldsError, Limit};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::kinds::{Measure, TypeChecker};
use crate::options::OptionsResolver;
use crate::translator::TranslationParams;
use crate::values::{is_empty, loosely_equal, option_key, ValueStore};

/// The kinds of user-facing violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Required,
    InvalidType,
    TooSmall,
    TooLarge,
    InvalidOption,
    PatternMismatch,
    Mismatch,
    MustDiffer,
}

impl ViolationCode {
    /// Translation token for the message.
    pub fn token(&self) -> &'static str {
        match self {
            ViolationCode::Required => "form.required",
            ViolationCode::InvalidType => "form.invalid_type",
            ViolationCode::TooSmall => "form.too_small",
            ViolationCode::TooLarge => "form.too_large",
            ViolationCode::InvalidOption => "form.invalid_option",
            ViolationCode::PatternMismatch => "form.pattern_mismatch",
            ViolationCode::Mismatch => "form.mismatch",
            ViolationCode::MustDiffer => "form.must_differ",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One failed check. `params` hold untranslated values; `other` carries the
/// caption token of the field a `matches` rule points at.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub code: ViolationCode,
    pub params: TranslationParams,
}

impl Violation {
    fn new(code: ViolationCode) -> Self {
        Self {
            code,
            params: TranslationParams::new(),
        }
    }

    fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Rules prepared once per set of definitions: compiled `regex` patterns,
/// with every temporal limit checked against its field's format.
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    patterns: IndexMap<String, Regex>,
}

impl CompiledRules {
    pub fn compile(registry: &FieldRegistry, config: &EngineConfig) -> Result<Self> {
        let types = TypeChecker::new(config);
        let mut patterns = IndexMap::new();
        for (key, def) in registry.iter() {
            types.check_limits(key, def)?;
            if let Some(pattern) = &def.regex {
                let re = Regex::new(pattern).map_err(|e| FieldsError::InvalidDefinition {
                    field: key.clone(),
                    reason: format!("bad regex: {e}"),
                })?;
                patterns.insert(key.clone(), re);
            }
        }
        trace!(fields = registry.len(), patterns = patterns.len(), "rules compiled");
        Ok(Self { patterns })
    }

    pub fn pattern(&self, key: &str) -> Option<&Regex> {
        self.patterns.get(key)
    }
}

pub struct ConstraintEvaluator<'a> {
    registry: &'a FieldRegistry,
    rules: &'a CompiledRules,
    options: &'a OptionsResolver<'a>,
    types: TypeChecker<'a>,
}

impl<'a> ConstraintEvaluator<'a> {
    /// `rules` must be compiled from the same `registry`.
    pub fn new(
        registry: &'a FieldRegistry,
        rules: &'a CompiledRules,
        options: &'a OptionsResolver<'a>,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            registry,
            rules,
            options,
            types: TypeChecker::new(config),
        }
    }

    /// Run every applicable check on `key`.
    ///
    /// `Err` only for broken definitions (an unusable limit or an unknown
    /// options list); violations come back in the `Ok` vector.
    pub fn evaluate(&self, key: &str, required: bool, values: &ValueStore) -> Result<Vec<Violation>> {
        let def = self.registry.get(key)?;
        let value = values.value(key);

        if is_empty(def.type_, value) {
            if required {
                trace!(field = %key, "required value missing");
                return Ok(vec![Violation::new(ViolationCode::Required)]);
            }
            return Ok(Vec::new());
        }

        let type_params = def.type_params.as_ref();
        let Some(measure) = self.types.check(def.type_, type_params, value) else {
            trace!(field = %key, field_type = %def.type_, "value has wrong type");
            return Ok(vec![
                Violation::new(ViolationCode::InvalidType).with("type", def.type_.as_str())
            ]);
        };

        let mut violations = Vec::new();
        self.check_bounds(key, def, &measure, &mut violations)?;
        self.check_options(key, value, &mut violations)?;
        self.check_regex(key, value, &mut violations);
        self.check_matches(def, value, values, &mut violations)?;

        if !violations.is_empty() {
            trace!(field = %key, count = violations.len(), "constraint violations");
        }
        Ok(violations)
    }

    fn check_bounds(
        &self,
        key: &str,
        def: &FieldDefinition,
        measure: &Measure,
        violations: &mut Vec<Violation>,
    ) -> Result<()> {
        if !def.type_.supports_bounds() || *measure == Measure::Unbounded {
            return Ok(());
        }
        let format = self.types.format_for(def.type_, def.type_params.as_ref());

        if let Some(min) = &def.min {
            if compare(key, def.type_, measure, min, format)? == Ordering::Less {
                violations.push(Violation::new(ViolationCode::TooSmall).with("min", min.as_text()));
            }
        }
        if let Some(max) = &def.max {
            if compare(key, def.type_, measure, max, format)? == Ordering::Greater {
                violations.push(Violation::new(ViolationCode::TooLarge).with("max", max.as_text()));
            }
        }
        Ok(())
    }

    fn check_options(&self, key: &str, value: &Value, violations: &mut Vec<Violation>) -> Result<()> {
        let Some(options) = self.options.resolve(key)? else {
            return Ok(());
        };
        let allowed = |item: &Value| option_key(item).is_some_and(|k| options.contains_key(&k));
        let ok = match value {
            Value::Array(items) => items.iter().all(allowed),
            other => allowed(other),
        };
        if !ok {
            violations.push(Violation::new(ViolationCode::InvalidOption));
        }
        Ok(())
    }

    fn check_regex(&self, key: &str, value: &Value, violations: &mut Vec<Violation>) {
        let (Some(re), Some(text)) = (self.rules.pattern(key), value.as_str()) else {
            return;
        };
        if !re.is_match(text) {
            violations.push(Violation::new(ViolationCode::PatternMismatch));
        }
    }

    fn check_matches(
        &self,
        def: &FieldDefinition,
        value: &Value,
        values: &ValueStore,
        violations: &mut Vec<Violation>,
    ) -> Result<()> {
        let Some(rule) = def.match_rule() else {
            return Ok(());
        };
        let other_def = self.registry.get(&rule.field)?;
        let other = values.value(&rule.field);
        let equal = !is_empty(other_def.type_, other) && loosely_equal(value, other);

        let code = match (rule.negated, equal) {
            (false, false) => ViolationCode::Mismatch,
            (true, true) => ViolationCode::MustDiffer,
            _ => return Ok(()),
        };
        violations.push(Violation::new(code).with("other", other_def.caption_or(&rule.field)));
        Ok(())
    }
}

fn compare(
    key: &str,
    field_type: FieldType,
    measure: &Measure,
    limit: &Limit,
    format: Option<&str>,
) -> Result<Ordering> {
    measure.compare(limit, format).ok_or_else(|| {
        FieldsError::InvalidDefinition {
            field: key.to_string(),
            reason: format!("limit '{limit}' cannot bound a {field_type} value"),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StaticOptions;
    use formguard_fields::FieldDefinition;
    use serde_json::json;

    fn codes(
        registry: &FieldRegistry,
        values: &ValueStore,
        key: &str,
        required: bool,
    ) -> Result<Vec<ViolationCode>> {
        let provider = StaticOptions::new().with_list("colours", [("red", "Red"), ("blue", "Blue")]);
        let options = OptionsResolver::new(registry, &provider);
        let config = EngineConfig::default();
        let rules = CompiledRules::compile(registry, &config)?;
        let evaluator = ConstraintEvaluator::new(registry, &rules, &options, &config);
        Ok(evaluator
            .evaluate(key, required, values)?
            .into_iter()
            .map(|v| v.code)
            .collect())
    }

    fn single(def: FieldDefinition, value: Value) -> Vec<ViolationCode> {
        let registry = FieldRegistry::from_definitions([("f", def)]).unwrap();
        let mut values = ValueStore::from_registry(&registry);
        values.set("f", value, false);
        codes(&registry, &values, "f", false).unwrap()
    }

    #[test]
    fn test_required_short_circuits() {
        let registry = FieldRegistry::from_definitions([(
            "age",
            FieldDefinition::new(FieldType::Int).with_min(18).with_regex("^x$"),
        )])
        .unwrap();
        let values = ValueStore::from_registry(&registry);
        assert_eq!(
            codes(&registry, &values, "age", true).unwrap(),
            vec![ViolationCode::Required]
        );
        assert!(codes(&registry, &values, "age", false).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_type_stops_other_checks() {
        let def = FieldDefinition::new(FieldType::Int).with_min(5).with_options([("1", "One")]);
        assert_eq!(single(def, json!("abc")), vec![ViolationCode::InvalidType]);
    }

    #[test]
    fn test_string_length_bounds() {
        let def = FieldDefinition::new(FieldType::String).with_min(3).with_max(5);
        assert_eq!(single(def.clone(), json!("ab")), vec![ViolationCode::TooSmall]);
        assert_eq!(single(def.clone(), json!("abcdef")), vec![ViolationCode::TooLarge]);
        assert!(single(def, json!("abcd")).is_empty());
    }

    #[test]
    fn test_list_bounds_count_elements() {
        let def = FieldDefinition::new(FieldType::List).with_max(2);
        assert_eq!(single(def.clone(), json!(["a", "b", "c"])), vec![ViolationCode::TooLarge]);
        assert!(single(def, json!(["abcdefgh", "ijklmnop"])).is_empty());
    }

    #[test]
    fn test_numeric_and_date_bounds() {
        let int = FieldDefinition::new(FieldType::Int).with_min(18).with_max(99);
        assert_eq!(single(int.clone(), json!("17")), vec![ViolationCode::TooSmall]);
        assert!(single(int, json!(18)).is_empty());

        let date = FieldDefinition::new(FieldType::Date)
            .with_min("2024-01-01")
            .with_max("2024-12-31");
        assert_eq!(single(date.clone(), json!("2023-12-31")), vec![ViolationCode::TooSmall]);
        assert!(single(date, json!("2024-07-01")).is_empty());
    }

    #[test]
    fn test_unusable_limit_is_a_definition_error() {
        let registry = FieldRegistry::from_definitions([(
            "from",
            FieldDefinition::new(FieldType::Date).with_min(3),
        )])
        .unwrap();
        let mut values = ValueStore::from_registry(&registry);
        values.set("from", json!("2024-01-01"), false);
        assert!(codes(&registry, &values, "from", false).is_err());
    }

    #[test]
    fn test_options_inline_named_and_list() {
        let size = FieldDefinition::new(FieldType::String).with_options([("s", "S"), ("m", "M")]);
        assert!(single(size.clone(), json!("m")).is_empty());
        assert_eq!(single(size, json!("xl")), vec![ViolationCode::InvalidOption]);

        let colour = FieldDefinition::new(FieldType::String).with_options_list("colours");
        assert!(single(colour.clone(), json!("red")).is_empty());
        assert_eq!(single(colour, json!("green")), vec![ViolationCode::InvalidOption]);

        let many = FieldDefinition::new(FieldType::List).with_options_list("colours");
        assert!(single(many.clone(), json!(["red", "blue"])).is_empty());
        assert_eq!(single(many, json!(["red", "pink"])), vec![ViolationCode::InvalidOption]);
    }

    #[test]
    fn test_checks_accumulate() {
        let def = FieldDefinition::new(FieldType::String)
            .with_max(3)
            .with_regex("^[0-9]+$");
        assert_eq!(
            single(def, json!("abcdef")),
            vec![ViolationCode::TooLarge, ViolationCode::PatternMismatch]
        );
    }

    #[test]
    fn test_matches_and_negation() {
        let registry = FieldRegistry::from_definitions([
            ("username", FieldDefinition::new(FieldType::String)),
            ("password", FieldDefinition::new(FieldType::String)),
            (
                "password_again",
                FieldDefinition::new(FieldType::String).matching("password"),
            ),
            (
                "nickname",
                FieldDefinition::new(FieldType::String).not_matching("username"),
            ),
        ])
        .unwrap();
        let mut values = ValueStore::from_registry(&registry);
        values.set("username", json!("alice"), false);
        values.set("password", json!("secret"), false);
        values.set("password_again", json!("secret"), false);
        values.set("nickname", json!("alice"), false);

        assert!(codes(&registry, &values, "password_again", false).unwrap().is_empty());
        assert_eq!(
            codes(&registry, &values, "nickname", false).unwrap(),
            vec![ViolationCode::MustDiffer]
        );

        values.set("password_again", json!("Secret"), false);
        values.set("nickname", json!("al"), false);
        assert_eq!(
            codes(&registry, &values, "password_again", false).unwrap(),
            vec![ViolationCode::Mismatch]
        );
        assert!(codes(&registry, &values, "nickname", false).unwrap().is_empty());
    }

    #[test]
    fn test_violation_params() {
        let registry = FieldRegistry::from_definitions([
            (
                "password",
                FieldDefinition::new(FieldType::String).with_caption("form.password"),
            ),
            (
                "repeat",
                FieldDefinition::new(FieldType::String)
                    .matching("password")
                    .with_min(8),
            ),
        ])
        .unwrap();
        let mut values = ValueStore::from_registry(&registry);
        values.set("repeat", json!("short"), false);
        let provider = StaticOptions::new();
        let options = OptionsResolver::new(&registry, &provider);
        let config = EngineConfig::default();
        let rules = CompiledRules::compile(&registry, &config).unwrap();
        let violations = ConstraintEvaluator::new(&registry, &rules, &options, &config)
            .evaluate("repeat", false, &values)
            .unwrap();

        assert_eq!(violations[0].params.get("min").map(String::as_str), Some("8"));
        assert_eq!(
            violations[1].params.get("other").map(String::as_str),
            Some("form.password")
        );
    }

    #[test]
    fn test_compiled_rules_hold_one_pattern_per_field() {
        let registry = FieldRegistry::from_definitions([
            ("code", FieldDefinition::new(FieldType::String).with_regex("^[A-Z]{3}$")),
            ("note", FieldDefinition::new(FieldType::String)),
        ])
        .unwrap();
        let rules = CompiledRules::compile(&registry, &EngineConfig::default()).unwrap();
        assert!(rules.pattern("code").is_some_and(|re| re.is_match("ABC")));
        assert!(rules.pattern("note").is_none());
    }

    #[test]
    fn test_compiled_rules_reject_unreadable_temporal_limit() {
        let registry = FieldRegistry::from_definitions([(
            "from",
            FieldDefinition::new(FieldType::Date).with_min("1st of May"),
        )])
        .unwrap();
        assert!(matches!(
            CompiledRules::compile(&registry, &EngineConfig::default()),
            Err(crate::error::FormError::Fields(FieldsError::InvalidDefinition { field, .. })) if field == "from"
        ));
    }

    #[test]
    fn test_tokens() {
        assert_eq!(ViolationCode::Required.token(), "form.required");
        assert_eq!(ViolationCode::MustDiffer.to_string(), "form.must_differ");
    }
}
