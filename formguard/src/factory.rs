//! Form factory: builds named forms wired with shared collaborators.
//!
//! Forms are registered under a class name composed as
//! `prefix + CamelCase(name) + postfix`, so `get_form("user_signup")` with
//! prefix `App` and the default postfix resolves `AppUserSignupForm`.

use std::sync::Arc;

use formguard_fields::FieldRegistry;
use indexmap::IndexMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{FormError, Result};
use crate::form::Form;
use crate::options::{OptionsProvider, StaticOptions};
use crate::translator::{MessageCatalog, Translator};

/// Default class-name suffix.
pub const DEFAULT_POSTFIX: &str = "Form";

/// Produces the field definitions of one form.
pub type DefinitionBuilder = Arc<dyn Fn() -> Result<FieldRegistry> + Send + Sync>;

pub struct FormFactory {
    prefix: String,
    postfix: String,
    builders: IndexMap<String, DefinitionBuilder>,
    translator: Arc<dyn Translator>,
    options: Arc<dyn OptionsProvider>,
    config: Arc<EngineConfig>,
}

impl Default for FormFactory {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            postfix: DEFAULT_POSTFIX.to_string(),
            builders: IndexMap::new(),
            translator: Arc::new(MessageCatalog::english()),
            options: Arc::new(StaticOptions::new()),
            config: Arc::new(EngineConfig::default()),
        }
    }
}

impl FormFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_options(mut self, options: Arc<dyn OptionsProvider>) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = config;
        self
    }

    /// Register a form under its full class name, e.g. `UserSignupForm`.
    pub fn register<F>(&mut self, class: impl Into<String>, builder: F)
    where
        F: Fn() -> Result<FieldRegistry> + Send + Sync + 'static,
    {
        self.builders.insert(class.into(), Arc::new(builder));
    }

    /// Class name that `name` resolves to.
    pub fn class_name(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, camel_case(name), self.postfix)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(&self.class_name(name))
    }

    /// Build a fresh form for `name`.
    pub fn get_form(&self, name: &str) -> Result<Form> {
        let class = self.class_name(name);
        let builder = self
            .builders
            .get(&class)
            .ok_or_else(|| FormError::UnknownForm {
                name: name.to_string(),
                class: class.clone(),
            })?;

        let registry = builder()?;
        debug!(form = %name, class = %class, fields = registry.len(), "form built");
        Form::builder(registry)
            .name(name)
            .translator(Arc::clone(&self.translator))
            .options(Arc::clone(&self.options))
            .config(Arc::clone(&self.config))
            .build()
    }
}

/// `user_signup`, `user-signup` and `user signup` all become `UserSignup`.
fn camel_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formguard_fields::{FieldDefinition, FieldType};
    use rstest::rstest;

    fn login() -> Result<FieldRegistry> {
        Ok(FieldRegistry::from_definitions([
            ("username", FieldDefinition::new(FieldType::String).required()),
            ("password", FieldDefinition::new(FieldType::String).required()),
        ])?)
    }

    #[rstest]
    #[case("login", "LoginForm")]
    #[case("user_signup", "UserSignupForm")]
    #[case("user-signup", "UserSignupForm")]
    #[case("userSignup", "UserSignupForm")]
    fn test_class_name(#[case] name: &str, #[case] class: &str) {
        assert_eq!(FormFactory::new().class_name(name), class);
    }

    #[test]
    fn test_prefix_and_postfix() {
        let factory = FormFactory::new().with_prefix("App").with_postfix("Definition");
        assert_eq!(factory.class_name("login"), "AppLoginDefinition");
    }

    #[test_log::test]
    fn test_get_form_builds_fresh_instances() {
        let mut factory = FormFactory::new();
        factory.register("LoginForm", login);
        assert!(factory.contains("login"));

        let mut first = factory.get_form("login").unwrap();
        first.set_value("username", serde_json::json!("alice")).unwrap();
        let second = factory.get_form("login").unwrap();

        assert_eq!(second.name(), "login");
        assert_eq!(second.value("username").unwrap(), &serde_json::Value::Null);
    }

    #[test]
    fn test_unknown_form() {
        let factory = FormFactory::new().with_prefix("App");
        match factory.get_form("missing") {
            Err(FormError::UnknownForm { name, class }) => {
                assert_eq!(name, "missing");
                assert_eq!(class, "AppMissingForm");
            }
            other => panic!("expected unknown form, got {other:?}"),
        }
    }
}
