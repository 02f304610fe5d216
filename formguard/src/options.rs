//! Options capability: named, ordered value → label lists.

use std::borrow::Cow;

use formguard_fields::{FieldRegistry, OptionList, OptionsSource};
use indexmap::IndexMap;

use crate::error::{FormError, Result};

/// Serves option lists referenced by name from field definitions.
pub trait OptionsProvider: Send + Sync {
    /// The list called `name`, in display order, or `None` if unknown.
    fn get_options(&self, name: &str) -> Option<OptionList>;
}

/// In-memory options provider.
#[derive(Debug, Clone, Default)]
pub struct StaticOptions {
    lists: IndexMap<String, OptionList>,
}

impl StaticOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a list, keeping the given option order.
    pub fn with_list<I, K, L>(mut self, name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        let list = options
            .into_iter()
            .map(|(k, l)| (k.into(), l.into()))
            .collect();
        self.lists.insert(name.into(), list);
        self
    }
}

impl OptionsProvider for StaticOptions {
    fn get_options(&self, name: &str) -> Option<OptionList> {
        self.lists.get(name).cloned()
    }
}

/// Materializes the options of registry fields, asking the provider only for
/// fields that reference a named list.
pub struct OptionsResolver<'a> {
    registry: &'a FieldRegistry,
    provider: &'a dyn OptionsProvider,
}

impl<'a> OptionsResolver<'a> {
    pub fn new(registry: &'a FieldRegistry, provider: &'a dyn OptionsProvider) -> Self {
        Self { registry, provider }
    }

    /// Options of `key`, or `None` when the field has no options rule.
    pub fn resolve(&self, key: &str) -> Result<Option<Cow<'a, OptionList>>> {
        let def = self.registry.get(key)?;
        match &def.options {
            None => Ok(None),
            Some(OptionsSource::Inline(list)) => Ok(Some(Cow::Borrowed(list))),
            Some(OptionsSource::List(name)) => self
                .provider
                .get_options(name)
                .map(|list| Some(Cow::Owned(list)))
                .ok_or_else(|| FormError::UnknownOptionsList {
                    field: key.to_string(),
                    list: name.clone(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formguard_fields::{FieldDefinition, FieldType};

    fn registry() -> FieldRegistry {
        FieldRegistry::from_definitions([
            (
                "size",
                FieldDefinition::new(FieldType::String).with_options([("s", "Small"), ("l", "Large")]),
            ),
            (
                "country",
                FieldDefinition::new(FieldType::String).with_options_list("countries"),
            ),
            (
                "region",
                FieldDefinition::new(FieldType::String).with_options_list("regions"),
            ),
            ("note", FieldDefinition::new(FieldType::String)),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolves_inline_named_and_missing() {
        let registry = registry();
        let provider =
            StaticOptions::new().with_list("countries", [("de", "Germany"), ("fr", "France")]);
        let resolver = OptionsResolver::new(&registry, &provider);

        let size = resolver.resolve("size").unwrap().unwrap();
        assert_eq!(size.keys().collect::<Vec<_>>(), vec!["s", "l"]);

        let country = resolver.resolve("country").unwrap().unwrap();
        assert_eq!(country.get("fr").map(String::as_str), Some("France"));

        assert!(resolver.resolve("note").unwrap().is_none());
    }

    #[test]
    fn test_unknown_list_is_reported() {
        let registry = registry();
        let provider = StaticOptions::new();
        let resolver = OptionsResolver::new(&registry, &provider);
        assert!(matches!(
            resolver.resolve("region"),
            Err(FormError::UnknownOptionsList { field, list }) if field == "region" && list == "regions"
        ));
    }
}
