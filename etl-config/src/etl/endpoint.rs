//! Data endpoints and the registry that deduplicates them
//!
//! Endpoints are identified by a key computed from their configuration, not by
//! their display name. Two actions that describe the same database schema or
//! the same file end up sharing one registry entry even if they call it by
//! different names.

use crate::document::type_name;
use crate::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

const KEY_SEPARATOR: &str = "|";

/// A registered data endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEndpoint {
    pub name: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    pub key: String,
    /// The configuration block the endpoint was built from, including `key`.
    pub config: Map<String, Value>,
}

impl DataEndpoint {
    /// Build an endpoint from its configuration block. `name` and `type` are
    /// required strings.
    pub fn from_config(config: &Map<String, Value>, source: &Path) -> ConfigResult<Self> {
        let name = required_string(config, "name", source)?;
        let endpoint_type = required_string(config, "type", source)?;
        let key = endpoint_key(config);

        let mut config = config.clone();
        config.insert("key".to_string(), Value::String(key.clone()));

        Ok(Self {
            name,
            endpoint_type,
            key,
            config,
        })
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

fn required_string(config: &Map<String, Value>, field: &str, source: &Path) -> ConfigResult<String> {
    match config.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) => Err(ConfigError::schema(
            source,
            format!(
                "data endpoint '{}' must be a non-empty string, found {}",
                field,
                type_name(other)
            ),
        )),
        None => Err(ConfigError::schema(
            source,
            format!("data endpoint is missing required '{}'", field),
        )),
    }
}

/// Compute the identity key of an endpoint configuration.
///
/// * database endpoints (`config` and `schema` present): `type|config|schema`
/// * file and directory endpoints (`path` present): `type|path|name`
/// * anything else: the configuration itself, with keys sorted and without
///   `key` and `paths`
///
/// The key is the hex MD5 digest of the chosen identity.
pub fn endpoint_key(config: &Map<String, Value>) -> String {
    let part = |field: &str| config.get(field).map(scalar_text).unwrap_or_default();

    let identity = if config.contains_key("config") && config.contains_key("schema") {
        [part("type"), part("config"), part("schema")].join(KEY_SEPARATOR)
    } else if config.contains_key("path") {
        [part("type"), part("path"), part("name")].join(KEY_SEPARATOR)
    } else {
        let mut identity = String::new();
        let filtered: Map<String, Value> = config
            .iter()
            .filter(|(k, _)| k.as_str() != "key" && k.as_str() != "paths")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        write_canonical(&Value::Object(filtered), &mut identity);
        identity
    };

    format!("{:x}", md5::compute(identity.as_bytes()))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            write_canonical(other, &mut out);
            out
        }
    }
}

/// JSON text with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Endpoints of one resolution, keyed by identity, plus short aliases for the
/// global default endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointRegistry {
    endpoints: IndexMap<String, DataEndpoint>,
    aliases: IndexMap<String, String>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the endpoint described by `config` and write its key back into
    /// `config`. Returns the key.
    ///
    /// Registering a configuration whose key is already known keeps the first
    /// registration. A new key whose display name is already used by another
    /// endpoint is registered with a warning.
    pub fn register(&mut self, config: &mut Value, source: &Path) -> ConfigResult<String> {
        let found = type_name(config);
        let Value::Object(block) = config else {
            return Err(ConfigError::schema(
                source,
                format!("data endpoint configuration must be an object, found {}", found),
            ));
        };

        let endpoint = DataEndpoint::from_config(block, source)?;
        let key = endpoint.key.clone();
        block.insert("key".to_string(), Value::String(key.clone()));

        if !self.endpoints.contains_key(&key) {
            if let Some(existing) = self
                .endpoints
                .values()
                .find(|e| e.name == endpoint.name)
            {
                warn!(
                    "Data endpoint name '{}' is used by {} and {}",
                    endpoint.name, existing.key, key
                );
            }
            debug!(
                "Registered {} endpoint '{}' ({})",
                endpoint.endpoint_type, endpoint.name, key
            );
            self.endpoints.insert(key.clone(), endpoint);
        }

        Ok(key)
    }

    /// Remember `alias` for `key` unless the alias is already taken.
    pub fn add_alias(&mut self, alias: impl Into<String>, key: impl Into<String>) {
        self.aliases.entry(alias.into()).or_insert_with(|| key.into());
    }

    pub fn get(&self, key: &str) -> Option<&DataEndpoint> {
        self.endpoints.get(key)
    }

    /// The endpoint registered under a global alias such as `utility`.
    pub fn get_alias(&self, alias: &str) -> Option<&DataEndpoint> {
        self.aliases.get(alias).and_then(|key| self.endpoints.get(key))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, k)| (a.as_str(), k.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataEndpoint)> {
        self.endpoints.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Adopt endpoints and aliases from `other` that are not known here.
    pub fn merge(&mut self, other: &EndpointRegistry) {
        for (key, endpoint) in &other.endpoints {
            self.endpoints
                .entry(key.clone())
                .or_insert_with(|| endpoint.clone());
        }
        for (alias, key) in &other.aliases {
            self.add_alias(alias.clone(), key.clone());
        }
    }

    pub fn clear(&mut self) {
        self.endpoints.clear();
        self.aliases.clear();
    }
}
