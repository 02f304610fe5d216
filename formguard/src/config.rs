//! Engine configuration using Figment
//!
//! Precedence, lowest first: built-in defaults → `formguard.toml` →
//! `formguard.yaml` → `formguard.json` (all optional, current directory) →
//! `FORMGUARD_*` environment variables.

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Prefix for environment variable overrides, e.g. `FORMGUARD_DATE_FORMAT`.
pub const ENV_PREFIX: &str = "FORMGUARD_";

/// Settings that shape type parsing and text rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// chrono format for `date` fields without `type_params.format`
    pub date_format: String,
    /// chrono format for `datetime` fields; RFC 3339 is always accepted too
    pub datetime_format: String,
    /// chrono format for `time` fields
    pub time_format: String,
    /// Spaces per indentation level in `errors_as_text`
    pub text_indent: usize,
    /// Heading for errors of fields without a page
    pub unpaged_heading: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            time_format: "%H:%M:%S".to_string(),
            text_indent: 2,
            unpaged_heading: "General".to_string(),
        }
    }
}

impl EngineConfig {
    /// The full provider stack: defaults, config files, environment.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("formguard.toml"))
            .merge(Yaml::file("formguard.yaml"))
            .merge(Json::file("formguard.json"))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from [`figment()`](Self::figment).
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Extract from a caller-built figment. Missing keys keep their defaults.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: EngineConfig = figment.extract()?;
        debug!(
            date_format = %config.date_format,
            datetime_format = %config.datetime_format,
            time_format = %config.time_format,
            "engine configuration loaded"
        );
        Ok(config)
    }
}
