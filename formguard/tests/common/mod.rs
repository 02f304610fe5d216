//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use formguard::{FieldRegistry, Form, MessageCatalog, StaticOptions, Values};
use serde_json::Value;

const REGISTRATION: &str = include_str!("../fixtures/registration.yaml");

/// Registry of the registration wizard, loaded through the YAML path.
pub fn registration_registry() -> FieldRegistry {
    let definitions: Value = serde_yaml_ng::from_str(REGISTRATION).unwrap();
    FieldRegistry::from_value(definitions).unwrap()
}

pub fn countries() -> StaticOptions {
    StaticOptions::new().with_list(
        "countries",
        [("de", "Germany"), ("fr", "France"), ("nl", "Netherlands")],
    )
}

pub fn catalog() -> MessageCatalog {
    MessageCatalog::english()
        .with("form.username", "Username")
        .with("form.password", "Password")
        .with("form.password_again", "Repeat password")
        .with("form.contact", "Contact")
        .with("form.street", "Street")
        .with("form.phone", "Phone")
        .with("form.country", "Country")
        .with("form.birthday", "Birthday")
        .with("form.newsletter", "Newsletter")
}

pub fn registration_form() -> Form {
    Form::builder(registration_registry())
        .name("registration")
        .translator(Arc::new(catalog()))
        .options(Arc::new(countries()))
        .build()
        .unwrap()
}

/// Build a `Values` map from a JSON object literal.
pub fn values(object: Value) -> Values {
    serde_json::from_value(object).unwrap()
}
