//! Translation capability used for captions and error messages.
//!
//! The engine only ever calls [`Translator::translate`]; any backend can sit
//! behind it. Two in-memory implementations ship with the crate.

use indexmap::IndexMap;

/// Named values substituted into a message, e.g. `%min%`.
pub type TranslationParams = IndexMap<String, String>;

/// Turns a token plus parameters into display text.
pub trait Translator: Send + Sync {
    fn translate(&self, token: &str, params: &TranslationParams) -> String;
}

/// Replace every `%name%` placeholder with its parameter value in one pass.
///
/// Substituted values are never scanned again; a `%` that does not open a
/// known placeholder is kept as is.
pub fn interpolate(message: &str, params: &TranslationParams) -> String {
    let mut text = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(start) = rest.find('%') {
        text.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let placeholder = after
            .find('%')
            .and_then(|end| params.get(&after[..end]).map(|value| (end, value)));
        match placeholder {
            Some((end, value)) => {
                text.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                text.push('%');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// Returns tokens unchanged apart from placeholder substitution.
///
/// Handy when captions are already translated strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate(&self, token: &str, params: &TranslationParams) -> String {
        interpolate(token, params)
    }
}

/// In-memory token → message table.
///
/// Unknown tokens fall through unchanged, so pre-translated captions work
/// alongside catalogue tokens.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    messages: IndexMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages for every violation token the engine emits.
    pub fn english() -> Self {
        Self::new()
            .with("form.required", "%caption% is required")
            .with("form.invalid_type", "%caption% must be a valid %type%")
            .with("form.too_small", "%caption% must be at least %min%")
            .with("form.too_large", "%caption% must be at most %max%")
            .with("form.invalid_option", "%caption% must be one of the allowed options")
            .with("form.pattern_mismatch", "%caption% has an invalid format")
            .with("form.mismatch", "%caption% must match %other%")
            .with("form.must_differ", "%caption% must differ from %other%")
    }

    /// Add or replace one message.
    pub fn with(mut self, token: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(token.into(), message.into());
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, message: impl Into<String>) {
        self.messages.insert(token.into(), message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Translator for MessageCatalog {
    fn translate(&self, token: &str, params: &TranslationParams) -> String {
        let message = self.messages.get(token).map_or(token, String::as_str);
        interpolate(message, params)
    }
}
