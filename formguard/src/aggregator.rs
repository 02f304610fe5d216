//! Error Aggregator: translated violations of the last validation pass.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{FormError, Result};
use crate::translator::TranslationParams;

/// One user-facing error tied to a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: String,
    /// Message token, e.g. `form.required`
    pub token: String,
    /// Translated message
    pub message: String,
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: TranslationParams,
}

/// Errors grouped by page, then by field.
pub type ErrorsByPage<'a> = BTreeMap<Option<u32>, IndexMap<String, Vec<&'a ValidationError>>>;

/// Collects errors keyed by the owning field's definition position, so every
/// listing comes out in field order regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct ErrorAggregator {
    by_position: BTreeMap<usize, Vec<ValidationError>>,
    validated: bool,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error for the field at `position`.
    pub fn add(&mut self, position: usize, error: ValidationError) {
        self.by_position.entry(position).or_default().push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.by_position.is_empty()
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Record that a validation pass completed.
    pub fn mark_validated(&mut self) {
        self.validated = true;
    }

    /// Back to the state before any validation pass.
    pub fn clear(&mut self) {
        self.by_position.clear();
        self.validated = false;
    }

    fn ensure_validated(&self) -> Result<()> {
        if self.validated {
            Ok(())
        } else {
            Err(FormError::ValidationNotRun)
        }
    }

    /// Whether the last pass found nothing.
    pub fn is_valid(&self) -> Result<bool> {
        self.ensure_validated()?;
        Ok(!self.has_errors())
    }

    /// All errors in field order.
    pub fn errors(&self) -> Result<Vec<&ValidationError>> {
        self.ensure_validated()?;
        Ok(self.by_position.values().flatten().collect())
    }

    /// Errors bucketed by page; the unpaged bucket comes first.
    pub fn errors_by_page(&self) -> Result<ErrorsByPage<'_>> {
        self.ensure_validated()?;
        let mut pages: ErrorsByPage<'_> = BTreeMap::new();
        for error in self.by_position.values().flatten() {
            pages
                .entry(error.page)
                .or_default()
                .entry(error.field.clone())
                .or_default()
                .push(error);
        }
        Ok(pages)
    }

    /// The error of the earliest field, if any.
    pub fn first_error(&self) -> Option<&ValidationError> {
        self.by_position.values().flatten().next()
    }

    /// Indented listing grouped by page:
    ///
    /// ```text
    /// General
    ///   Username: Username is required
    /// Page 2
    ///   Zip: Zip must be at least 5
    /// ```
    ///
    /// `captions` maps field keys to their translated captions.
    pub fn as_text(&self, config: &EngineConfig, captions: &IndexMap<String, String>) -> Result<String> {
        let indent = " ".repeat(config.text_indent);
        let mut text = String::new();
        for (page, fields) in self.errors_by_page()? {
            match page {
                Some(page) => {
                    let _ = writeln!(text, "Page {page}");
                }
                None => {
                    let _ = writeln!(text, "{}", config.unpaged_heading);
                }
            }
            for (field, errors) in fields {
                let caption = captions.get(&field).map_or(field.as_str(), String::as_str);
                for error in errors {
                    let _ = writeln!(text, "{indent}{caption}: {}", error.message);
                }
            }
        }
        Ok(text)
    }
}
