//! Type parsing for field values.
//!
//! A value either coerces into its field's type, yielding the [`Measure`]
//! that `min`/`max` are compared against, or it is rejected as the wrong type.

use std::cmp::Ordering;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use formguard_fields::{FieldDefinition, FieldType, FieldsError, Limit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::values::parse_bool;

/// Email address pattern
pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(EMAIL_PATTERN).ok());

const SHORT_TIME_FORMAT: &str = "%H:%M";

/// The quantity a typed value is bounded by.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Number(f64),
    /// Character count
    Length(usize),
    /// Element count
    Count(usize),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Well-typed but not bounded (bool, switch, ip)
    Unbounded,
}

impl Measure {
    /// Compare against a limit. `None` means the limit cannot be read as this
    /// kind of quantity, which is a definition error.
    pub fn compare(&self, limit: &Limit, format: Option<&str>) -> Option<Ordering> {
        match self {
            Measure::Number(n) => n.partial_cmp(&limit.as_number()?),
            Measure::Length(n) | Measure::Count(n) => (*n as f64).partial_cmp(&limit.as_number()?),
            Measure::Date(d) => match temporal_limit(FieldType::Date, limit, format)? {
                Measure::Date(bound) => Some(d.cmp(&bound)),
                _ => None,
            },
            Measure::DateTime(dt) => match temporal_limit(FieldType::Datetime, limit, format)? {
                Measure::DateTime(bound) => Some(dt.cmp(&bound)),
                _ => None,
            },
            Measure::Time(t) => match temporal_limit(FieldType::Time, limit, format)? {
                Measure::Time(bound) => Some(t.cmp(&bound)),
                _ => None,
            },
            Measure::Unbounded => Some(Ordering::Equal),
        }
    }
}

/// Read a `date`/`datetime`/`time` limit written in `format`.
fn temporal_limit(field_type: FieldType, limit: &Limit, format: Option<&str>) -> Option<Measure> {
    let Limit::Text(text) = limit else {
        return None;
    };
    let text = text.trim();
    let format = format?;
    match field_type {
        FieldType::Date => NaiveDate::parse_from_str(text, format).ok().map(Measure::Date),
        FieldType::Datetime => NaiveDateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|v| v.naive_utc()))
            .map(Measure::DateTime),
        FieldType::Time => NaiveTime::parse_from_str(text, format)
            .or_else(|_| NaiveTime::parse_from_str(text, SHORT_TIME_FORMAT))
            .ok()
            .map(Measure::Time),
        _ => None,
    }
}

fn param<'v>(type_params: Option<&'v Value>, name: &str) -> Option<&'v Value> {
    type_params.and_then(|params| params.get(name))
}

/// Coerces values into field types using the engine configuration for
/// default temporal formats.
pub struct TypeChecker<'a> {
    config: &'a EngineConfig,
}

impl<'a> TypeChecker<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// chrono format used for a temporal field.
    pub fn format_for<'v>(&'v self, field_type: FieldType, type_params: Option<&'v Value>) -> Option<&'v str> {
        if let Some(format) = param(type_params, "format").and_then(Value::as_str) {
            return Some(format);
        }
        match field_type {
            FieldType::Date => Some(self.config.date_format.as_str()),
            FieldType::Datetime => Some(self.config.datetime_format.as_str()),
            FieldType::Time => Some(self.config.time_format.as_str()),
            _ => None,
        }
    }

    /// Fails when a temporal limit of `def` cannot be read in the field's
    /// format. Numeric limits are checked with the definition itself.
    pub fn check_limits(&self, key: &str, def: &FieldDefinition) -> Result<()> {
        if !def.type_.is_temporal() {
            return Ok(());
        }
        let format = self.format_for(def.type_, def.type_params.as_ref());
        for limit in [&def.min, &def.max].into_iter().flatten() {
            if temporal_limit(def.type_, limit, format).is_none() {
                return Err(FieldsError::InvalidDefinition {
                    field: key.to_string(),
                    reason: format!("limit '{limit}' is not a {} in the field's format", def.type_),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The value's measure, or `None` if it is not a valid `field_type`.
    pub fn check(&self, field_type: FieldType, type_params: Option<&Value>, value: &Value) -> Option<Measure> {
        match field_type {
            FieldType::Int => parse_int(value).map(|n| Measure::Number(n as f64)),
            FieldType::Numeric => {
                let (number, text) = parse_numeric(value)?;
                if let Some(precision) = param(type_params, "precision").and_then(Value::as_u64) {
                    if decimals(&text) as u64 > precision {
                        return None;
                    }
                }
                Some(Measure::Number(number))
            }
            FieldType::Scalar => match value {
                Value::String(s) => Some(Measure::Length(s.chars().count())),
                Value::Number(n) => n.as_f64().map(Measure::Number),
                Value::Bool(_) => Some(Measure::Unbounded),
                _ => None,
            },
            FieldType::List => {
                let items = value.as_array()?;
                items
                    .iter()
                    .all(|item| matches!(item, Value::String(_) | Value::Number(_) | Value::Bool(_)))
                    .then(|| Measure::Count(items.len()))
            }
            FieldType::Bool | FieldType::Switch => parse_bool(value).map(|_| Measure::Unbounded),
            FieldType::String => value.as_str().map(|s| Measure::Length(s.chars().count())),
            FieldType::Email => {
                let s = value.as_str()?;
                matches!(&*EMAIL, Some(re) if re.is_match(s))
                    .then(|| Measure::Length(s.chars().count()))
            }
            FieldType::Ip => {
                let ip: IpAddr = value.as_str()?.trim().parse().ok()?;
                let wanted = param(type_params, "version").and_then(Value::as_u64);
                let ok = match wanted {
                    Some(4) => ip.is_ipv4(),
                    Some(6) => ip.is_ipv6(),
                    _ => true,
                };
                ok.then_some(Measure::Unbounded)
            }
            FieldType::Url => {
                let s = value.as_str()?;
                let url = url::Url::parse(s.trim()).ok()?;
                let allowed = match param(type_params, "schemes").and_then(Value::as_array) {
                    Some(schemes) => schemes
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme())),
                    None => url.has_host(),
                };
                allowed.then(|| Measure::Length(s.chars().count()))
            }
            FieldType::Date => {
                let format = self.format_for(field_type, type_params)?;
                NaiveDate::parse_from_str(value.as_str()?.trim(), format)
                    .ok()
                    .map(Measure::Date)
            }
            FieldType::Datetime => {
                let format = self.format_for(field_type, type_params)?;
                let text = value.as_str()?.trim();
                NaiveDateTime::parse_from_str(text, format)
                    .ok()
                    .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|v| v.naive_utc()))
                    .map(Measure::DateTime)
            }
            FieldType::Time => {
                let explicit = param(type_params, "format").is_some();
                let format = self.format_for(field_type, type_params)?;
                let text = value.as_str()?.trim();
                NaiveTime::parse_from_str(text, format)
                    .ok()
                    .or_else(|| {
                        (!explicit)
                            .then(|| NaiveTime::parse_from_str(text, SHORT_TIME_FORMAT).ok())
                            .flatten()
                    })
                    .map(Measure::Time)
            }
        }
    }
}

fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_numeric(value: &Value) -> Option<(f64, String)> {
    let (number, text) = match value {
        Value::Number(n) => (n.as_f64()?, n.to_string()),
        Value::String(s) => {
            let text = s.trim();
            (text.parse::<f64>().ok()?, text.to_string())
        }
        _ => return None,
    };
    number.is_finite().then_some((number, text))
}

/// Significant decimal places of a number written in plain or exponent form.
fn decimals(text: &str) -> usize {
    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().unwrap_or(0)),
        None => (text, 0),
    };
    let fraction_len = mantissa.split_once('.').map_or(0, |(_, fraction)| fraction.len());
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let trailing_zeros = digits.len() - digits.trim_end_matches('0').len();

    let scale = fraction_len as i64 - exponent - trailing_zeros as i64;
    usize::try_from(scale).unwrap_or(0)
}
