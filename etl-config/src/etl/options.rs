//! Action options and the options classes that describe them
//!
//! Every action names an options class (explicitly, or implied by its section).
//! Class names are resolved against an [`OptionsClassRegistry`] populated up
//! front; there is no lookup by reflection. Built-in classes cover ingestors,
//! aggregators and maintenance actions. The data endpoint options class is also
//! registered so that naming it for an action is reported as the wrong kind of
//! class rather than an unknown one.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// Separator between namespace components in options class names.
pub const NAMESPACE_SEPARATOR: char = '\\';

pub const INGESTOR_OPTIONS: &str = "ETL\\Ingestor\\IngestorOptions";
pub const AGGREGATOR_OPTIONS: &str = "ETL\\Aggregator\\AggregatorOptions";
pub const MAINTENANCE_OPTIONS: &str = "ETL\\Maintenance\\MaintenanceOptions";
pub const DATA_ENDPOINT_OPTIONS: &str = "ETL\\DataEndpoint\\DataEndpointOptions";

/// The kind of action an options class configures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Ingestor,
    Aggregator,
    Maintenance,
    /// A user-registered options class.
    Custom(String),
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestor => write!(f, "ingestor"),
            Self::Aggregator => write!(f, "aggregator"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// What a registered options class describes.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsClassKind {
    Action(ActionKind),
    /// Options of a data endpoint; not usable for actions.
    DataEndpoint,
}

/// A registered options class.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsClass {
    /// Fully qualified name.
    pub name: String,
    pub kind: OptionsClassKind,
    /// Property values used when an enabled action does not set them.
    pub defaults: Map<String, Value>,
}

impl OptionsClass {
    pub fn action(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind: OptionsClassKind::Action(kind),
            defaults: Map::new(),
        }
    }

    pub fn data_endpoint(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: OptionsClassKind::DataEndpoint,
            defaults: Map::new(),
        }
    }

    pub fn with_default(mut self, property: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(property.into(), value);
        self
    }

    /// The action kind, if this class configures actions.
    pub fn action_kind(&self) -> Option<&ActionKind> {
        match &self.kind {
            OptionsClassKind::Action(kind) => Some(kind),
            OptionsClassKind::DataEndpoint => None,
        }
    }
}

/// Options classes known to a resolution, by name.
#[derive(Debug, Clone, Default)]
pub struct OptionsClassRegistry {
    classes: IndexMap<String, OptionsClass>,
}

impl OptionsClassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in classes, reachable by fully qualified and short name.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        let database_defaults = |class: OptionsClass| {
            class
                .with_default("truncate_destination", Value::Bool(false))
                .with_default("stop_on_exception", Value::Bool(true))
                .with_default("buffered_query", Value::Bool(false))
                .with_default("optimize_query", Value::Bool(true))
                .with_default("disable_keys", Value::Bool(false))
        };

        registry.register(database_defaults(OptionsClass::action(
            INGESTOR_OPTIONS,
            ActionKind::Ingestor,
        )));
        registry.register(
            database_defaults(OptionsClass::action(
                AGGREGATOR_OPTIONS,
                ActionKind::Aggregator,
            ))
            .with_default("analyze_table", Value::Bool(true)),
        );
        registry.register(
            OptionsClass::action(MAINTENANCE_OPTIONS, ActionKind::Maintenance)
                .with_default("truncate_destination", Value::Bool(false))
                .with_default("stop_on_exception", Value::Bool(true)),
        );
        registry.register(OptionsClass::data_endpoint(DATA_ENDPOINT_OPTIONS));
        registry
    }

    /// Register a class under its name and, when qualified, its short name.
    /// A short name already taken by another class is left alone.
    pub fn register(&mut self, class: OptionsClass) {
        let short = short_name(&class.name).to_string();
        if short != class.name {
            self.classes.entry(short).or_insert_with(|| class.clone());
        }
        self.classes.insert(class.name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<&OptionsClass> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Options class implied by a section name, if any.
    pub fn section_default(section: &str) -> Option<&'static str> {
        match section {
            "ingestors" | "ingestor" => Some(INGESTOR_OPTIONS),
            "aggregators" | "aggregator" => Some(AGGREGATOR_OPTIONS),
            "maintenance" => Some(MAINTENANCE_OPTIONS),
            _ => None,
        }
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(name)
}

/// Qualify an options class name with a namespace. Names that already contain
/// a separator, or calls without a namespace, are returned unchanged.
pub fn qualify_class_name(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains(NAMESPACE_SEPARATOR) => {
            if ns.ends_with(NAMESPACE_SEPARATOR) {
                format!("{}{}", ns, name)
            } else {
                format!("{}{}{}", ns, NAMESPACE_SEPARATOR, name)
            }
        }
        _ => name.to_string(),
    }
}

/// Interpret a boolean-like value: booleans, `0`/`1`, and the strings
/// `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0` and the empty string.
/// `null` is false.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The resolved options of one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOptions {
    pub name: String,
    pub section: String,
    pub class: String,
    /// Fully qualified options class name.
    pub options_class: String,
    pub kind: ActionKind,
    pub enabled: bool,
    pub description: Option<String>,
    pub namespace: Option<String>,
    /// Endpoint role (such as `source` or `destination`) to endpoint key.
    pub endpoints: IndexMap<String, String>,
    /// Every other property of the action.
    pub properties: Map<String, Value>,
}

impl ActionOptions {
    /// Keys that map onto typed fields rather than the property bag.
    pub const IDENTITY_KEYS: [&'static str; 7] = [
        "name",
        "class",
        "options_class",
        "enabled",
        "description",
        "namespace",
        "endpoints",
    ];

    /// The key of the endpoint registered for `role`.
    pub fn endpoint_key(&self, role: &str) -> Option<&str> {
        self.endpoints.get(role).map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Variables of the action, including those supplied by the caller and
    /// the path variables.
    pub fn variables(&self) -> Option<&Map<String, Value>> {
        self.properties.get("variables").and_then(Value::as_object)
    }

    /// Flatten into a JSON object. Endpoint roles appear as properties whose
    /// value is the endpoint key.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("class".into(), Value::String(self.class.clone()));
        map.insert(
            "options_class".into(),
            Value::String(self.options_class.clone()),
        );
        if let Some(namespace) = &self.namespace {
            map.insert("namespace".into(), Value::String(namespace.clone()));
        }
        if let Some(description) = &self.description {
            map.insert("description".into(), Value::String(description.clone()));
        }
        map.insert("enabled".into(), Value::Bool(self.enabled));
        for (role, key) in &self.endpoints {
            map.insert(role.clone(), Value::String(key.clone()));
        }
        for (property, value) in &self.properties {
            map.entry(property.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }
}
