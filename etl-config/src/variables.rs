//! Configuration variable substitution
//!
//! Strings in a configuration may contain `${name}` macros. Variables come from
//! two places: values supplied by the caller, and the entries of the `paths`
//! block (every path is available as a variable of the same name). Caller
//! supplied values are registered first and are never overwritten by path
//! variables.
//!
//! Unknown names are left in place untouched, so a string like `${HOME}` that is
//! meant for a later consumer survives resolution.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::trace;

/// Matches `${name}` where name is a valid identifier.
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable pattern is a valid regex")
});

/// Ordered name to value store used for `${name}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: IndexMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable unless it is already defined. Returns `true` if stored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.values.contains_key(&name) {
            trace!("Variable '{}' already defined, keeping existing value", name);
            return false;
        }
        self.values.insert(name, value.into());
        true
    }

    /// Set a variable, replacing any existing value.
    pub fn overwrite(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add every entry of `other` that is not defined here yet.
    pub fn extend_missing(&mut self, other: &VariableStore) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Replace every known `${name}` in `input`.
    pub fn substitute(&self, input: &str) -> String {
        if self.values.is_empty() || !input.contains("${") {
            return input.to_string();
        }

        VARIABLE_PATTERN
            .replace_all(input, |caps: &Captures| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Substitute every string in a JSON tree. Keys are not substituted.
    pub fn substitute_value(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                let replaced = self.substitute(s);
                if replaced != *s {
                    *s = replaced;
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.substitute_value(item);
                }
            }
            Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    self.substitute_value(item);
                }
            }
            _ => {}
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (name, value) in iter {
            store.set(name, value);
        }
        store
    }
}
