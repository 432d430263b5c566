//! Configuration loading pipeline
//!
//! Every configuration goes through the same stages:
//!
//! ```text
//! Unloaded -> Parsed -> PreTransformed -> Transformed -> SectionsPopulated
//!          -> Interpreted -> SubconfigsMerged -> Ready
//! ```
//!
//! [`ConfigurationCore`] holds the state shared by all configurations (file
//! names, the parsed and transformed documents, the section store, the key
//! transformers and variables). The [`Configuration`] trait drives the stages
//! through [`Configuration::initialize`] and exposes hooks that specialised
//! configurations override to give sections a meaning.
//!
//! After the top-level file is interpreted, every `*.json` file found directly
//! inside the local configuration directory is loaded as a configuration of the
//! same type, initialized, and merged into the top level in file name order.

use crate::document::load_document;
use crate::paths::{qualify_and_resolve, resolve_path};
use crate::sections::SectionStore;
use crate::transform::{TransformContext, TransformEngine};
use crate::variables::VariableStore;
use crate::{ConfigError, ConfigResult};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// Suffix of the implied local configuration directory, `<stem>.d`.
const LOCAL_DIR_SUFFIX: &str = ".d";

/// Stage of the loading pipeline a configuration has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigState {
    #[default]
    Unloaded,
    Parsed,
    PreTransformed,
    Transformed,
    SectionsPopulated,
    Interpreted,
    SubconfigsMerged,
    Ready,
    /// A stage failed; the configuration must not be used.
    Failed,
}

/// Options shared by every configuration type.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Directory relative paths are resolved against. Defaults to the
    /// directory containing the configuration file.
    pub base_dir: Option<PathBuf>,
    /// Directory holding local configuration files to merge.
    pub local_config_dir: Option<PathBuf>,
    /// Set for configurations loaded from the local configuration directory.
    pub is_local_config: bool,
    /// Variables available for `${name}` substitution. These take precedence
    /// over variables derived from the configuration itself.
    pub config_variables: VariableStore,
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_local_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_config_dir = Some(dir.into());
        self
    }

    pub fn with_local_config(mut self, is_local_config: bool) -> Self {
        self.is_local_config = is_local_config;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_variables.set(name, value);
        self
    }

    pub fn with_variables(mut self, variables: VariableStore) -> Self {
        self.config_variables = variables;
        self
    }
}

/// State common to all configurations.
#[derive(Debug)]
pub struct ConfigurationCore {
    filename: PathBuf,
    base_dir: PathBuf,
    local_config_dir: Option<PathBuf>,
    is_local_config: bool,
    state: ConfigState,
    parsed: Option<Value>,
    transformed: Option<Value>,
    sections: SectionStore,
    engine: TransformEngine,
    variables: VariableStore,
}

impl ConfigurationCore {
    /// Set up a configuration for `filename`. Nothing is read yet.
    ///
    /// A relative filename is qualified against the current directory. The
    /// base directory defaults to the directory containing the file; a relative
    /// local configuration directory is qualified against the base directory.
    pub fn new(filename: impl AsRef<Path>, options: ConfigOptions) -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::file_read(".", e))?;
        let filename = qualify_and_resolve(filename, &cwd);

        let base_dir = match options.base_dir {
            Some(dir) => qualify_and_resolve(dir, &cwd),
            None => filename
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone()),
        };

        let local_config_dir = options
            .local_config_dir
            .map(|dir| qualify_and_resolve(dir, &base_dir));

        debug!(
            "Configuration {} (base dir {})",
            filename.display(),
            base_dir.display()
        );

        Ok(Self {
            filename,
            base_dir,
            local_config_dir,
            is_local_config: options.is_local_config,
            state: ConfigState::Unloaded,
            parsed: None,
            transformed: None,
            sections: SectionStore::new(),
            engine: TransformEngine::with_defaults(),
            variables: options.config_variables,
        })
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn local_config_dir(&self) -> Option<&Path> {
        self.local_config_dir.as_deref()
    }

    /// Set the local configuration directory, qualified against the base
    /// directory.
    pub fn set_local_config_dir(&mut self, dir: impl AsRef<Path>) {
        self.local_config_dir = Some(qualify_and_resolve(dir, &self.base_dir));
    }

    pub fn is_local_config(&self) -> bool {
        self.is_local_config
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConfigState) {
        trace!("{}: {:?} -> {:?}", self.filename.display(), self.state, state);
        self.state = state;
    }

    /// The document as read from disk, before any transformation.
    pub fn parsed(&self) -> Option<&Value> {
        self.parsed.as_ref()
    }

    pub fn parsed_mut(&mut self) -> Option<&mut Value> {
        self.parsed.as_mut()
    }

    pub fn transformed(&self) -> Option<&Value> {
        self.transformed.as_ref()
    }

    pub fn transformed_mut(&mut self) -> Option<&mut Value> {
        self.transformed.as_mut()
    }

    pub fn sections(&self) -> &SectionStore {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut SectionStore {
        &mut self.sections
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransformEngine {
        &mut self.engine
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    /// Read the file unless it was already read. `force` re-reads it.
    pub fn parse(&mut self, force: bool) -> ConfigResult<()> {
        if self.parsed.is_some() && !force {
            trace!("{} already parsed", self.filename.display());
            return Ok(());
        }
        self.parsed = Some(load_document(&self.filename)?);
        Ok(())
    }

    /// Run the key transformers over a copy of the parsed document, then
    /// substitute variables in every string of the result.
    pub fn transform(&mut self) -> ConfigResult<()> {
        let parsed = self.parsed.clone().ok_or_else(|| {
            ConfigError::schema(&self.filename, "configuration has not been parsed")
        })?;

        let context = TransformContext::new(&self.base_dir)
            .with_document(&self.filename)
            .with_variables(self.variables.clone());

        let mut transformed = self.engine.transform(parsed, &context)?;
        self.variables.substitute_value(&mut transformed);
        self.transformed = Some(transformed);
        Ok(())
    }

    /// Register every top-level key of the transformed document as a section.
    pub fn populate_sections(&mut self) -> ConfigResult<()> {
        let Some(Value::Object(map)) = &self.transformed else {
            return Err(ConfigError::schema(
                &self.filename,
                "top level of a configuration must be an object",
            ));
        };

        for (name, payload) in map {
            self.sections.add(name.clone(), payload.clone(), true);
        }
        debug!(
            "{}: {} sections",
            self.filename.display(),
            self.sections.len()
        );
        Ok(())
    }

    /// The directory local configuration files are read from, if any.
    ///
    /// Local configurations never have one. Otherwise the configured directory
    /// is used, falling back to `<stem>.d` next to the file when that exists.
    pub fn effective_local_config_dir(&self) -> Option<PathBuf> {
        if self.is_local_config {
            return None;
        }
        if let Some(dir) = &self.local_config_dir {
            return Some(dir.clone());
        }

        let stem = self.filename.file_stem()?.to_string_lossy();
        let implied = self
            .filename
            .with_file_name(format!("{}{}", stem, LOCAL_DIR_SUFFIX));
        implied.is_dir().then_some(implied)
    }

    /// `*.json` files (case-insensitive) directly inside the local
    /// configuration directory, sorted by file name.
    pub fn local_config_files(&self) -> ConfigResult<Vec<PathBuf>> {
        let Some(dir) = self.effective_local_config_dir() else {
            return Ok(Vec::new());
        };

        if !dir.is_dir() {
            warn!(
                "Local configuration directory {} does not exist, skipping",
                dir.display()
            );
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                match e.into_io_error() {
                    Some(io) => ConfigError::file_read(path, io),
                    None => ConfigError::schema(path, "filesystem loop"),
                }
            })?;

            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

            if is_json && path.is_file() {
                files.push(resolve_path(path));
            } else {
                trace!("Ignoring {} in local configuration directory", path.display());
            }
        }

        debug!(
            "Found {} local configuration files in {}",
            files.len(),
            dir.display()
        );
        Ok(files)
    }

    /// Merge another configuration's transformed document into this one.
    ///
    /// Missing keys are adopted. Existing arrays are appended to. Any other
    /// collision keeps the existing value unless `overwrite` is set.
    pub fn merge_document(&mut self, other: &ConfigurationCore, overwrite: bool) {
        let Some(Value::Object(incoming)) = &other.transformed else {
            return;
        };

        let target = self
            .transformed
            .get_or_insert_with(|| Value::Object(Default::default()));
        let Value::Object(target) = target else {
            return;
        };

        for (key, value) in incoming {
            match target.get_mut(key) {
                None => {
                    target.insert(key.clone(), value.clone());
                }
                Some(existing) if overwrite => *existing = value.clone(),
                Some(existing) => {
                    if !append(existing, value) {
                        info!(
                            "Key '{}' from {} already set, skipping",
                            key,
                            other.filename.display()
                        );
                    }
                }
            }
        }
    }

    /// Merge another configuration's sections using the same policy as
    /// [`ConfigurationCore::merge_document`].
    pub fn merge_sections(&mut self, other: &ConfigurationCore, overwrite: bool) {
        for (name, payload) in other.sections.iter() {
            match self.sections.get_mut(name) {
                None => {
                    self.sections.add(name, payload.clone(), true);
                }
                Some(existing) if overwrite => *existing = payload.clone(),
                Some(existing) => {
                    if !append(existing, payload) {
                        info!(
                            "Section '{}' from {} already present, skipping",
                            name,
                            other.filename.display()
                        );
                    }
                }
            }
        }
    }

    /// Release the documents and sections once their content is consumed.
    pub fn cleanup(&mut self) {
        self.parsed = None;
        self.transformed = None;
        self.sections.clear();
    }

    /// Forget the transformed document and sections, keeping the parsed one.
    pub fn reset(&mut self) {
        self.transformed = None;
        self.sections.clear();
        self.state = ConfigState::Unloaded;
    }

    /// Serialize the transformed document.
    pub fn to_json(&self, pretty: bool) -> ConfigResult<String> {
        let value = self.transformed.as_ref().unwrap_or(&Value::Null);
        let rendered = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.map_err(|e| ConfigError::serialize(&self.filename, e))
    }
}

/// Append `incoming` to `existing` if it is an array. An incoming array is
/// appended element by element. Returns false when `existing` cannot be
/// appended to.
fn append(existing: &mut Value, incoming: &Value) -> bool {
    let Value::Array(items) = existing else {
        return false;
    };
    match incoming {
        Value::Array(more) => items.extend(more.iter().cloned()),
        single => items.push(single.clone()),
    }
    true
}

/// A configuration file processed through the loading pipeline.
///
/// Implementors supply access to their [`ConfigurationCore`] and a constructor
/// for local configurations; every other hook has a default.
pub trait Configuration: Sized {
    fn core(&self) -> &ConfigurationCore;

    fn core_mut(&mut self) -> &mut ConfigurationCore;

    /// Build the configuration for a file found in the local configuration
    /// directory. It is initialized by the caller.
    fn local_config(&self, path: &Path) -> ConfigResult<Self>;

    /// Runs after parsing and before transformation.
    fn pre_transform(&mut self) -> ConfigResult<()> {
        Ok(())
    }

    fn populate_sections(&mut self) -> ConfigResult<()> {
        self.core_mut().populate_sections()
    }

    /// Give the populated sections their meaning.
    fn interpret(&mut self) -> ConfigResult<()> {
        Ok(())
    }

    /// Merge an initialized local configuration into this one.
    fn merge(&mut self, local: &Self, overwrite: bool) -> ConfigResult<()> {
        self.core_mut().merge_document(local.core(), overwrite);
        self.core_mut().merge_sections(local.core(), overwrite);
        Ok(())
    }

    /// Runs once all local configurations are merged.
    fn post_merge(&mut self) -> ConfigResult<()> {
        Ok(())
    }

    /// Drop intermediate state. Called on local configurations after merge.
    fn cleanup(&mut self) {
        self.core_mut().cleanup();
    }

    /// Discard everything derived from the document so it can be processed
    /// again.
    fn reset(&mut self) {
        self.core_mut().reset();
    }

    /// Run the pipeline. A configuration that is already ready is left alone
    /// unless `force` is set, which re-reads the file and starts over.
    ///
    /// Any failure leaves the configuration in [`ConfigState::Failed`].
    fn initialize(&mut self, force: bool) -> ConfigResult<()> {
        if self.core().state() == ConfigState::Ready && !force {
            return Ok(());
        }
        if force || self.core().state() != ConfigState::Unloaded {
            self.reset();
        }

        let result = run_pipeline(self, force);
        if let Err(e) = &result {
            debug!("{} failed: {}", self.core().filename().display(), e);
            self.core_mut().set_state(ConfigState::Failed);
        }
        result
    }

    fn state(&self) -> ConfigState {
        self.core().state()
    }

    /// Serialize the transformed document.
    fn to_json(&self, pretty: bool) -> ConfigResult<String> {
        self.core().to_json(pretty)
    }
}

fn run_pipeline<C: Configuration>(config: &mut C, force: bool) -> ConfigResult<()> {
    config.core_mut().parse(force)?;
    config.core_mut().set_state(ConfigState::Parsed);

    config.pre_transform()?;
    config.core_mut().set_state(ConfigState::PreTransformed);

    config.core_mut().transform()?;
    config.core_mut().set_state(ConfigState::Transformed);

    config.populate_sections()?;
    config.core_mut().set_state(ConfigState::SectionsPopulated);

    config.interpret()?;
    config.core_mut().set_state(ConfigState::Interpreted);

    let local_files = config.core().local_config_files()?;
    if !local_files.is_empty() {
        for path in local_files {
            debug!("Merging local configuration {}", path.display());
            let mut local = config.local_config(&path)?;
            local.initialize(false)?;
            config.merge(&local, false)?;
            local.cleanup();
        }
        config.core_mut().set_state(ConfigState::SubconfigsMerged);
    }

    config.post_merge()?;
    config.core_mut().set_state(ConfigState::Ready);
    Ok(())
}

/// A configuration whose top-level keys are plain sections.
#[derive(Debug)]
pub struct GenericConfiguration {
    core: ConfigurationCore,
    options: ConfigOptions,
}

impl GenericConfiguration {
    pub fn new(filename: impl AsRef<Path>, options: ConfigOptions) -> ConfigResult<Self> {
        Ok(Self {
            core: ConfigurationCore::new(filename, options.clone())?,
            options,
        })
    }

    /// Create and initialize in one step.
    pub fn load(filename: impl AsRef<Path>, options: ConfigOptions) -> ConfigResult<Self> {
        let mut config = Self::new(filename, options)?;
        config.initialize(false)?;
        Ok(config)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.core.sections().names()
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.core.sections().get(name)
    }
}

impl Configuration for GenericConfiguration {
    fn core(&self) -> &ConfigurationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConfigurationCore {
        &mut self.core
    }

    fn local_config(&self, path: &Path) -> ConfigResult<Self> {
        let options = ConfigOptions {
            base_dir: Some(self.core.base_dir().to_path_buf()),
            local_config_dir: None,
            is_local_config: true,
            config_variables: self.options.config_variables.clone(),
        };
        Self::new(path, options)
    }
}
