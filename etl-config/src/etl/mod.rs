//! ETL pipeline configuration
//!
//! [`EtlConfiguration`] reads a configuration whose top-level keys are
//! pipeline sections holding arrays of actions, plus the reserved keys
//! `defaults`, `endpoints`, `paths`, `global`, `variables` and `module`:
//!
//! ```json
//! {
//!     "paths": {"table_definition_dir": "etl_tables.d"},
//!     "defaults": {
//!         "global": {
//!             "endpoints": {"utility": {"type": "mysql", "name": "Utility", "config": "datawarehouse", "schema": "modw"}}
//!         },
//!         "ingestors": {"enabled": true}
//!     },
//!     "ingestors": [
//!         {
//!             "name": "resource-types",
//!             "class": "StructuredFileIngestor",
//!             "definition_file": {"$ref": "${table_definition_dir}/resource_types.json"}
//!         }
//!     ]
//! }
//! ```
//!
//! Resolution lifts `paths` into `defaults.global.paths` (qualified against the
//! base directory, and usable as `${name}` variables in references), applies
//! section and global defaults to every action, registers data endpoints in a
//! single registry keyed by endpoint identity, and records the resolved
//! [`ActionOptions`] of every action per section. Files in the local
//! configuration directory are resolved the same way, inheriting the parent's
//! defaults, and merged in.
//!
//! When a module name is in effect, sections and actions are registered under
//! module-qualified names (see [`names`]). Every action also receives the
//! caller's variables and the path variables in its `variables` block, where
//! they replace values the action declares itself.

pub mod defaults;
pub mod endpoint;
pub mod names;
pub mod options;
pub mod overrides;

pub use endpoint::{DataEndpoint, EndpointRegistry};
pub use names::ActionName;
pub use options::{ActionKind, ActionOptions, OptionsClass, OptionsClassKind, OptionsClassRegistry};
pub use overrides::OptionOverride;

use crate::configuration::{ConfigOptions, Configuration, ConfigurationCore};
use crate::document::{deep_merge, type_name};
use crate::paths::qualify_and_resolve;
use crate::sections::SectionStore;
use crate::transform::{JsonReferenceResolver, MacroJsonReferenceResolver};
use crate::{ConfigError, ConfigResult};
use defaults::{apply_defaults_to_action, merge_parent_defaults, GLOBAL};
use indexmap::IndexMap;
use names::{qualify_action, qualify_section, short_name, NAME_SEPARATOR};
use options::{parse_bool, qualify_class_name};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Top-level keys that are never pipeline sections.
pub const RESERVED_KEYS: [&str; 6] = [
    DEFAULTS_KEY,
    "endpoints",
    PATHS_KEY,
    GLOBAL,
    VARIABLES_KEY,
    MODULE_KEY,
];

const DEFAULTS_KEY: &str = "defaults";
const PATHS_KEY: &str = "paths";
const VARIABLES_KEY: &str = "variables";
const MODULE_KEY: &str = "module";
const LOCAL_CONFIG_DIR_KEY: &str = "local_config_dir";

/// Actions of one section, by name.
pub type SectionActions = IndexMap<String, ActionOptions>;

/// Options for [`EtlConfiguration`].
#[derive(Debug, Clone)]
pub struct EtlConfigOptions {
    pub base: ConfigOptions,
    /// Applied to every action before it is registered.
    pub option_overrides: Vec<OptionOverride>,
    /// Effective defaults of the parent when loading a local configuration.
    pub parent_defaults: Option<Value>,
    /// Module name used when the configuration does not declare one. Passed
    /// on to local configurations.
    pub default_module_name: Option<String>,
    pub options_classes: Arc<OptionsClassRegistry>,
}

impl Default for EtlConfigOptions {
    fn default() -> Self {
        Self {
            base: ConfigOptions::default(),
            option_overrides: Vec::new(),
            parent_defaults: None,
            default_module_name: None,
            options_classes: Arc::new(OptionsClassRegistry::with_builtins()),
        }
    }
}

impl EtlConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: ConfigOptions) -> Self {
        self.base = base;
        self
    }

    pub fn with_override(mut self, option_override: OptionOverride) -> Self {
        self.option_overrides.push(option_override);
        self
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = OptionOverride>) -> Self {
        self.option_overrides.extend(overrides);
        self
    }

    pub fn with_parent_defaults(mut self, defaults: Value) -> Self {
        self.parent_defaults = Some(defaults);
        self
    }

    pub fn with_default_module_name(mut self, module: impl Into<String>) -> Self {
        self.default_module_name = Some(module.into());
        self
    }

    pub fn with_options_classes(mut self, registry: OptionsClassRegistry) -> Self {
        self.options_classes = Arc::new(registry);
        self
    }
}

/// A resolved ETL pipeline configuration.
#[derive(Debug)]
pub struct EtlConfiguration {
    core: ConfigurationCore,
    options: EtlConfigOptions,
    defaults: Option<Value>,
    paths: Option<Map<String, Value>>,
    module: Option<String>,
    endpoints: EndpointRegistry,
    actions: SectionStore<SectionActions>,
}

impl EtlConfiguration {
    pub fn new(filename: impl AsRef<Path>, options: EtlConfigOptions) -> ConfigResult<Self> {
        Ok(Self {
            core: ConfigurationCore::new(filename, options.base.clone())?,
            options,
            defaults: None,
            paths: None,
            module: None,
            endpoints: EndpointRegistry::new(),
            actions: SectionStore::new(),
        })
    }

    /// Create and initialize in one step.
    pub fn load(filename: impl AsRef<Path>, options: EtlConfigOptions) -> ConfigResult<Self> {
        let mut config = Self::new(filename, options)?;
        config.initialize(false)?;
        Ok(config)
    }

    pub fn filename(&self) -> &Path {
        self.core.filename()
    }

    /// The module this configuration's sections and actions belong to.
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Names of the pipeline sections.
    pub fn section_names(&self) -> Vec<&str> {
        self.actions.names()
    }

    /// The resolved payload of a section.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.core.sections().get(name)
    }

    pub fn section_exists(&self, name: &str) -> bool {
        self.actions.exists(name)
    }

    /// Every action of a section in declaration order, or `None` for an
    /// unknown section.
    pub fn configured_action_names(&self, section: &str) -> Option<Vec<&str>> {
        self.actions
            .get(section)
            .map(|actions| actions.keys().map(String::as_str).collect())
    }

    pub fn enabled_action_names(&self, section: &str) -> Option<Vec<&str>> {
        self.filter_actions(section, true)
    }

    pub fn disabled_action_names(&self, section: &str) -> Option<Vec<&str>> {
        self.filter_actions(section, false)
    }

    fn filter_actions(&self, section: &str, enabled: bool) -> Option<Vec<&str>> {
        self.actions.get(section).map(|actions| {
            actions
                .values()
                .filter(|a| a.enabled == enabled)
                .map(|a| a.name.as_str())
                .collect()
        })
    }

    pub fn section_action_options(&self, section: &str) -> Option<&SectionActions> {
        self.actions.get(section)
    }

    /// All actions, by section. The store's cursor can be used to walk
    /// sections one at a time.
    pub fn actions(&self) -> &SectionStore<SectionActions> {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut SectionStore<SectionActions> {
        &mut self.actions
    }

    /// Look up an action, optionally within one section.
    ///
    /// A qualified name (`section.action` or `module.section.action`) names
    /// its own section. Otherwise the name must be unique across sections;
    /// actions of a module also match by their short name.
    pub fn action_options(&self, name: &str, section: Option<&str>) -> ConfigResult<&ActionOptions> {
        let not_found = |section: Option<&str>| ConfigError::ActionNotFound {
            action: name.to_string(),
            section: section.map(str::to_string),
        };

        if let Some(section) = section {
            let actions = self.actions.get(section).ok_or_else(|| not_found(Some(section)))?;
            return actions
                .get(name)
                .or_else(|| actions.get(&qualify_action(section, name)))
                .ok_or_else(|| not_found(Some(section)));
        }

        if let Some(parsed) = ActionName::parse(name) {
            let section = parsed.section();
            return self
                .actions
                .get(&section)
                .and_then(|actions| actions.get(parsed.key()))
                .ok_or_else(|| not_found(Some(&section)));
        }

        let mut found: Vec<(&str, &ActionOptions)> = self
            .actions
            .iter()
            .flat_map(|(section, actions)| {
                actions
                    .iter()
                    .filter(|(key, _)| key.as_str() == name || short_name(key) == name)
                    .map(move |(_, action)| (section, action))
            })
            .collect();

        match found.len() {
            0 => Err(not_found(None)),
            1 => Ok(found.remove(0).1),
            _ => Err(ConfigError::AmbiguousAction {
                action: name.to_string(),
                sections: found.iter().map(|(s, _)| s.to_string()).collect(),
            }),
        }
    }

    /// A global default endpoint by alias (`utility`, `source`, ...).
    pub fn global_endpoint(&self, alias: &str) -> Option<&DataEndpoint> {
        self.endpoints.get_alias(alias)
    }

    pub fn data_endpoint(&self, key: &str) -> Option<&DataEndpoint> {
        self.endpoints.get(key)
    }

    pub fn data_endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// The qualified `paths` block, including `base_dir`.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.paths.as_ref()
    }

    fn parse_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::schema(self.core.filename(), message)
    }

    /// Qualify the `paths` block and move it into `defaults.global.paths`.
    fn lift_paths(&mut self) -> ConfigResult<()> {
        let filename = self.core.filename().to_path_buf();
        let base_dir = self.core.base_dir().to_path_buf();
        let is_local = self.core.is_local_config();

        let document = match self.core.parsed_mut() {
            Some(Value::Object(document)) => document,
            Some(other) => {
                let found = type_name(other);
                return Err(ConfigError::schema(
                    &filename,
                    format!("top level of a configuration must be an object, found {}", found),
                ));
            }
            None => return Err(ConfigError::schema(&filename, "configuration has not been parsed")),
        };

        if document
            .get(DEFAULTS_KEY)
            .and_then(|d| d.get(PATHS_KEY))
            .is_some_and(Value::is_object)
        {
            warn!(
                "'{}' found in '{}' of {}, expected at the top level",
                PATHS_KEY,
                DEFAULTS_KEY,
                filename.display()
            );
        }

        let paths = match document.shift_remove(PATHS_KEY) {
            Some(Value::Object(paths)) => paths,
            Some(other) => {
                return Err(ConfigError::schema(
                    &filename,
                    format!("'{}' must be an object, found {}", PATHS_KEY, type_name(&other)),
                ))
            }
            None if is_local => return Ok(()),
            None => {
                return Err(ConfigError::schema(
                    &filename,
                    format!("required configuration '{}' not found", PATHS_KEY),
                ))
            }
        };

        let mut qualified = Map::new();
        for (name, value) in paths {
            if name.starts_with('#') {
                continue;
            }
            let Value::String(path) = value else {
                return Err(ConfigError::schema(
                    &filename,
                    format!("path '{}' must be a string, found {}", name, type_name(&value)),
                ));
            };
            let path = qualify_and_resolve(&path, &base_dir);
            qualified.insert(name, Value::String(path.to_string_lossy().into_owned()));
        }
        qualified.insert(
            "base_dir".to_string(),
            Value::String(base_dir.to_string_lossy().into_owned()),
        );

        let defaults = document
            .entry(DEFAULTS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(defaults) = defaults else {
            return Err(ConfigError::schema(
                &filename,
                format!("'{}' must be an object", DEFAULTS_KEY),
            ));
        };
        let global = defaults
            .entry(GLOBAL)
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(global) = global else {
            return Err(ConfigError::schema(
                &filename,
                format!("'{}.{}' must be an object", DEFAULTS_KEY, GLOBAL),
            ));
        };
        global.insert(PATHS_KEY.to_string(), Value::Object(qualified.clone()));

        debug!("{}: {} paths", filename.display(), qualified.len());
        self.paths = Some(qualified);
        Ok(())
    }

    /// Merge parent defaults into the document's own and expose the resulting
    /// paths as variables.
    fn resolve_defaults(&mut self) -> ConfigResult<()> {
        let parent = self.options.parent_defaults.clone();
        let filename = self.core.filename().to_path_buf();

        let Some(Value::Object(document)) = self.core.parsed_mut() else {
            return Err(ConfigError::schema(&filename, "configuration has not been parsed"));
        };

        let local = document.shift_remove(DEFAULTS_KEY);
        let Some(effective) = merge_parent_defaults(parent.as_ref(), local) else {
            return Ok(());
        };

        let path_variables: Vec<(String, String)> = effective
            .get(GLOBAL)
            .and_then(|g| g.get(PATHS_KEY))
            .and_then(Value::as_object)
            .map(|paths| {
                paths
                    .iter()
                    .filter(|(name, _)| !name.starts_with('#'))
                    .filter_map(|(name, v)| v.as_str().map(|s| (name.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let local_config_dir = effective
            .get(GLOBAL)
            .and_then(|g| g.get(PATHS_KEY))
            .and_then(|p| p.get(LOCAL_CONFIG_DIR_KEY))
            .and_then(Value::as_str)
            .map(str::to_string);

        document.insert(DEFAULTS_KEY.to_string(), effective);

        for (name, value) in path_variables {
            self.core.variables_mut().set(name, value);
        }

        if let Some(dir) = local_config_dir {
            if self.core.local_config_dir().is_none() {
                self.core.set_local_config_dir(dir);
            }
        }
        Ok(())
    }

    /// Qualify section and action names with the module name, if there is
    /// one. Section defaults follow their section.
    fn disambiguate_action_names(&mut self) -> ConfigResult<()> {
        let filename = self.core.filename().to_path_buf();
        let default_module = self.options.default_module_name.clone();
        let Some(Value::Object(document)) = self.core.transformed_mut() else {
            return Err(ConfigError::schema(&filename, "configuration has not been transformed"));
        };

        let module = match document.get(MODULE_KEY) {
            Some(Value::String(module)) => Some(module.clone()),
            Some(Value::Null) | None => default_module,
            Some(other) => {
                return Err(ConfigError::schema(
                    &filename,
                    format!("'{}' must be a string, found {}", MODULE_KEY, type_name(other)),
                ))
            }
        }
        .filter(|module| !module.is_empty());

        let mut problems = Vec::new();
        if let Some(module) = &module {
            if module.contains(NAME_SEPARATOR) {
                problems.push(format!("module names cannot contain dots: '{}'", module));
            }
        }
        for (section, payload) in document.iter() {
            if RESERVED_KEYS.contains(&section.as_str()) {
                continue;
            }
            if section.contains(NAME_SEPARATOR) {
                problems.push(format!("pipeline names cannot contain dots: '{}'", section));
            }
            let names = payload
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|action| action.get("name").and_then(Value::as_str));
            for name in names {
                if name.contains(NAME_SEPARATOR) {
                    problems.push(format!("action names cannot contain dots: '{}'", name));
                }
            }
        }
        if !problems.is_empty() {
            return Err(ConfigError::schema(&filename, problems.join("; ")));
        }

        if let Some(module) = &module {
            let renamed: Map<String, Value> = std::mem::take(document)
                .into_iter()
                .map(|(key, mut value)| {
                    if RESERVED_KEYS.contains(&key.as_str()) {
                        return (key, value);
                    }
                    let section = qualify_section(Some(module), &key);
                    for action in value.as_array_mut().into_iter().flatten() {
                        if let Some(Value::String(name)) = action.get_mut("name") {
                            *name = qualify_action(&section, name);
                        }
                    }
                    (section, value)
                })
                .collect();
            *document = renamed;

            if let Some(Value::Object(defaults)) = document.get_mut(DEFAULTS_KEY) {
                let sections: Vec<String> = defaults
                    .keys()
                    .filter(|k| k.as_str() != GLOBAL && !k.contains(NAME_SEPARATOR))
                    .cloned()
                    .collect();
                for section in sections {
                    let Some(value) = defaults.shift_remove(&section) else {
                        continue;
                    };
                    // Inherited defaults may already use the qualified name.
                    let qualified = qualify_section(Some(module), &section);
                    match defaults.get_mut(&qualified) {
                        Some(existing) => deep_merge(existing, value),
                        None => {
                            defaults.insert(qualified, value);
                        }
                    }
                }
            }
            debug!("{}: module '{}'", filename.display(), module);
        }

        self.module = module;
        Ok(())
    }

    fn section_entries(&self) -> Vec<String> {
        match self.core.transformed() {
            Some(Value::Object(document)) => document
                .keys()
                .filter(|k| !RESERVED_KEYS.contains(&k.as_str()))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Register the action described by `config` in `section`.
    fn add_action(&mut self, section: &str, config: &mut Map<String, Value>) -> ConfigResult<()> {
        if section.is_empty() {
            return Err(self.parse_error("empty section name"));
        }

        let name = match config.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(self.parse_error(format!(
                    "action in section '{}' has no name",
                    section
                )))
            }
        };

        if self
            .actions
            .get(section)
            .is_some_and(|actions| actions.contains_key(&name))
        {
            return Err(ConfigError::DuplicateAction {
                action: name,
                section: section.to_string(),
                path: self.core.filename().to_path_buf(),
            });
        }

        let class = match config.get("class") {
            Some(Value::String(class)) => class.clone(),
            _ => {
                config.insert("class".to_string(), Value::String(name.clone()));
                name.clone()
            }
        };

        let namespace = config
            .get("namespace")
            .and_then(Value::as_str)
            .map(str::to_string);
        let description = config
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        let declared_class = match config.get("options_class") {
            Some(Value::String(class)) => Some(class.clone()),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(self.parse_error(format!(
                    "'options_class' of action '{}' must be a string, found {}",
                    name,
                    type_name(other)
                )))
            }
        };
        let options_class = match declared_class.or_else(|| {
            OptionsClassRegistry::section_default(short_name(section)).map(str::to_string)
        })
        {
            Some(class) => qualify_class_name(&class, namespace.as_deref()),
            None => {
                return Err(ConfigError::MissingOptionsClass {
                    action: name,
                    section: section.to_string(),
                    options_class: None,
                })
            }
        };

        let registry = Arc::clone(&self.options.options_classes);
        let descriptor = registry
            .get(&options_class)
            .ok_or_else(|| ConfigError::MissingOptionsClass {
                action: name.clone(),
                section: section.to_string(),
                options_class: Some(options_class.clone()),
            })?;
        let kind = descriptor
            .action_kind()
            .cloned()
            .ok_or_else(|| ConfigError::InvalidOptionsClass {
                action: name.clone(),
                section: section.to_string(),
                options_class: options_class.clone(),
            })?;

        let enabled = match config.get("enabled") {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| {
                self.parse_error(format!(
                    "'enabled' of action '{}' must be a boolean, found {}",
                    name, value
                ))
            })?,
        };

        let mut options = ActionOptions {
            name: name.clone(),
            section: section.to_string(),
            class,
            options_class: descriptor.name.clone(),
            kind,
            enabled,
            description,
            namespace,
            endpoints: IndexMap::new(),
            properties: Map::new(),
        };

        if enabled {
            if let Some(endpoints) = config.get_mut("endpoints") {
                let found = type_name(endpoints);
                let Value::Object(endpoints) = endpoints else {
                    return Err(ConfigError::schema(
                        self.core.filename(),
                        format!(
                            "'endpoints' of action '{}' must be an object, found {}",
                            name, found
                        ),
                    ));
                };
                for (role, endpoint) in endpoints.iter_mut() {
                    let key = self.endpoints.register(endpoint, self.core.filename())?;
                    options.endpoints.insert(role.clone(), key);
                }
            }

            for (property, value) in config.iter() {
                if !ActionOptions::IDENTITY_KEYS.contains(&property.as_str()) {
                    options.properties.insert(property.clone(), value.clone());
                }
            }
            for (property, value) in &descriptor.defaults {
                options
                    .properties
                    .entry(property.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        trace!(
            "Registered {} action '{}' in '{}' (enabled: {})",
            options.kind,
            name,
            section,
            enabled
        );
        self.actions.add(section, IndexMap::new(), false);
        if let Some(actions) = self.actions.get_mut(section) {
            actions.insert(name, options);
        }
        Ok(())
    }
}

impl Configuration for EtlConfiguration {
    fn core(&self) -> &ConfigurationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConfigurationCore {
        &mut self.core
    }

    fn local_config(&self, path: &Path) -> ConfigResult<Self> {
        let options = EtlConfigOptions {
            base: ConfigOptions {
                base_dir: Some(self.core.base_dir().to_path_buf()),
                local_config_dir: None,
                is_local_config: true,
                config_variables: self.options.base.config_variables.clone(),
            },
            option_overrides: self.options.option_overrides.clone(),
            parent_defaults: self.defaults.clone(),
            default_module_name: self.options.default_module_name.clone(),
            options_classes: Arc::clone(&self.options.options_classes),
        };
        Self::new(path, options)
    }

    fn pre_transform(&mut self) -> ConfigResult<()> {
        self.lift_paths()?;
        self.resolve_defaults()?;

        let engine = self.core.engine_mut();
        if !engine.replace(JsonReferenceResolver::NAME, MacroJsonReferenceResolver) {
            engine.register(MacroJsonReferenceResolver);
        }
        Ok(())
    }

    fn populate_sections(&mut self) -> ConfigResult<()> {
        self.disambiguate_action_names()?;

        let filename = self.core.filename().to_path_buf();
        let Some(Value::Object(document)) = self.core.transformed() else {
            return Err(ConfigError::schema(
                &filename,
                "top level of a configuration must be an object",
            ));
        };

        let sections: Vec<(String, Value)> = document
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (name, payload) in sections {
            self.core.sections_mut().add(name.clone(), payload, true);
            self.actions.add(name, IndexMap::new(), false);
        }
        Ok(())
    }

    fn interpret(&mut self) -> ConfigResult<()> {
        let filename = self.core.filename().to_path_buf();
        let section_names = self.section_entries();

        let mut document = match self.core.transformed_mut() {
            Some(Value::Object(document)) => std::mem::take(document),
            _ => return Err(ConfigError::schema(&filename, "configuration has not been transformed")),
        };

        let result = self.interpret_document(&mut document, &section_names);

        if let Some(Value::Object(target)) = self.core.transformed_mut() {
            *target = document;
        }
        result?;

        if let Some(Value::Object(document)) = self.core.transformed() {
            let resolved: Vec<(String, Value)> = section_names
                .iter()
                .filter_map(|name| document.get(name).map(|v| (name.clone(), v.clone())))
                .collect();
            for (name, payload) in resolved {
                self.core.sections_mut().add(name, payload, true);
            }
        }
        Ok(())
    }

    fn merge(&mut self, local: &Self, overwrite: bool) -> ConfigResult<()> {
        for (section, actions) in local.actions.iter() {
            for name in actions.keys() {
                let exists = self
                    .actions
                    .get(section)
                    .is_some_and(|existing| existing.contains_key(name));
                if exists && !overwrite {
                    return Err(ConfigError::DuplicateAction {
                        action: name.clone(),
                        section: section.to_string(),
                        path: local.core.filename().to_path_buf(),
                    });
                }
            }
        }

        self.core.merge_document(&local.core, overwrite);
        self.core.merge_sections(&local.core, overwrite);
        self.endpoints.merge(&local.endpoints);

        for (section, actions) in local.actions.iter() {
            self.actions.add(section, IndexMap::new(), false);
            if let Some(existing) = self.actions.get_mut(section) {
                for (name, options) in actions {
                    existing.insert(name.clone(), options.clone());
                }
            }
        }
        Ok(())
    }

    fn post_merge(&mut self) -> ConfigResult<()> {
        if let Some(Value::Object(document)) = self.core.parsed_mut() {
            document.shift_remove(DEFAULTS_KEY);
        }
        if let Some(Value::Object(document)) = self.core.transformed_mut() {
            document.shift_remove(DEFAULTS_KEY);
        }
        self.defaults = None;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.core.cleanup();
        self.options.parent_defaults = None;
        self.defaults = None;
    }

    fn reset(&mut self) {
        // Path lifting rewrites the parsed document, so it is read again.
        self.core.cleanup();
        self.core.reset();
        *self.core.variables_mut() = self.options.base.config_variables.clone();
        self.defaults = None;
        self.paths = None;
        self.module = None;
        self.endpoints.clear();
        self.actions.clear();
    }
}

impl EtlConfiguration {
    fn interpret_document(
        &mut self,
        document: &mut Map<String, Value>,
        section_names: &[String],
    ) -> ConfigResult<()> {
        let filename = self.core.filename().to_path_buf();

        let mut defaults = match document.get(DEFAULTS_KEY) {
            Some(Value::Object(defaults)) => defaults.clone(),
            Some(other) => {
                return Err(ConfigError::schema(
                    &filename,
                    format!("'{}' must be an object, found {}", DEFAULTS_KEY, type_name(other)),
                ))
            }
            None => Map::new(),
        };

        for section in section_names {
            let Some(payload) = document.get_mut(section) else {
                continue;
            };
            let found = type_name(payload);
            let Value::Array(actions) = payload else {
                return Err(ConfigError::schema(
                    &filename,
                    format!("'{}': expected array of action objects, got {}", section, found),
                ));
            };
            for action in actions.iter_mut() {
                let found = type_name(action);
                let Value::Object(action) = action else {
                    return Err(ConfigError::schema(
                        &filename,
                        format!("in section '{}', expected action object, got {}", section, found),
                    ));
                };
                apply_defaults_to_action(action, section, &defaults, &filename)?;
            }
        }

        if let Some(Value::Object(global)) = defaults.get_mut(GLOBAL) {
            if let Some(Value::Object(endpoints)) = global.get_mut("endpoints") {
                for (alias, endpoint) in endpoints.iter_mut() {
                    let key = self.endpoints.register(endpoint, &filename)?;
                    self.endpoints.add_alias(alias.clone(), key);
                }
            }
        }

        let priority_variables: Map<String, Value> = self
            .core
            .variables()
            .iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();

        let overrides: Vec<(String, Value)> = self
            .options
            .option_overrides
            .iter()
            .map(|o| (o.key.clone(), o.value()))
            .collect();

        for section in section_names {
            let Some(Value::Array(actions)) = document.get_mut(section) else {
                continue;
            };
            for action in actions.iter_mut() {
                let Value::Object(action) = action else {
                    continue;
                };
                if !priority_variables.is_empty() {
                    inject_priority_variables(action, &priority_variables, &filename)?;
                }
                for (key, value) in &overrides {
                    action.insert(key.clone(), value.clone());
                }
                self.add_action(section, action)?;
            }
        }

        debug!(
            "{}: {} sections, {} endpoints",
            filename.display(),
            section_names.len(),
            self.endpoints.len()
        );

        document.insert(DEFAULTS_KEY.to_string(), Value::Object(defaults.clone()));
        self.defaults = Some(Value::Object(defaults));
        Ok(())
    }
}

/// Add `priority` to the action's `variables`, replacing entries the action
/// declares itself.
fn inject_priority_variables(
    action: &mut Map<String, Value>,
    priority: &Map<String, Value>,
    source: &Path,
) -> ConfigResult<()> {
    match action.get_mut(VARIABLES_KEY) {
        None | Some(Value::Null) => {
            action.insert(VARIABLES_KEY.to_string(), Value::Object(priority.clone()));
        }
        Some(Value::Object(variables)) => {
            for (name, value) in priority {
                variables.insert(name.clone(), value.clone());
            }
        }
        Some(other) => {
            let found = type_name(other);
            let name = action.get("name").and_then(Value::as_str).unwrap_or_default();
            return Err(ConfigError::schema(
                source,
                format!(
                    "'{}' of action '{}' must be an object, found {}",
                    VARIABLES_KEY, name, found
                ),
            ));
        }
    }
    Ok(())
}
