//! Option overrides applied to every action
//!
//! Overrides come from the command line as `key=value` pairs. The value is
//! interpreted as JSON when that yields something other than null, so
//! `truncate_destination=true` sets a boolean and `units=["day","month"]` an
//! array. The literal `null` in any letter case always means JSON null, and
//! anything that is not valid JSON is kept as a plain string.
//!
//! Numeric-looking values therefore become numbers: `batch=10` sets the number
//! 10. Quote the value (`batch="10"`) to keep it a string.

use crate::{ConfigError, ConfigResult};
use serde_json::Value;
use std::str::FromStr;

/// One `key=value` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverride {
    pub key: String,
    pub raw_value: String,
}

impl OptionOverride {
    pub fn new(key: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            raw_value: raw_value.into(),
        }
    }

    /// Parse `key=value`. The value may itself contain `=`.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidOverride {
            raw: raw.to_string(),
        };

        let (key, value) = raw.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(key, value))
    }

    /// The interpreted value.
    pub fn value(&self) -> Value {
        interpret_override_value(&self.raw_value)
    }
}

impl FromStr for OptionOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Interpret a raw override value.
pub fn interpret_override_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if !value.is_null() => value,
        _ => Value::String(raw.to_string()),
    }
}
