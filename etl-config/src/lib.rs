//! ETL Configuration Resolution
//!
//! This crate turns a tree of JSON files describing an ETL pipeline into fully
//! resolved, validated configuration. Resolution runs in stages: the document
//! is parsed, rewritten by key transformers (comments are stripped and JSON
//! references are inlined), split into sections, and interpreted. Files in a
//! local configuration directory are resolved the same way and merged in.
//!
//! # Features
//!
//! - **Key transformers**: pluggable rewriting of individual object keys, with
//!   comment stripping (`"#"` keys) and `$ref` resolution built in
//! - **JSON references**: `{"$ref": "file.json#/pointer"}` replaces the
//!   enclosing object with a value from another file, relative to the base dir
//! - **Path macros**: `${name}` placeholders in strings and references, filled
//!   from caller variables and the configuration's own `paths` block
//! - **Layered defaults**: action properties inherit from section defaults,
//!   then global defaults, and local files inherit the parent's defaults
//! - **Endpoint registry**: data endpoints are deduplicated by identity key
//! - **Local configuration merge**: `<name>.d/*.json` files extend the
//!   top-level configuration in file name order
//!
//! # Quick Start
//!
//! ```no_run
//! use etl_config::{EtlConfigOptions, EtlConfiguration};
//!
//! let config = EtlConfiguration::load("etc/etl/etl.json", EtlConfigOptions::new())?;
//!
//! for section in config.section_names() {
//!     let enabled = config.enabled_action_names(section).unwrap_or_default();
//!     println!("{}: {} enabled actions", section, enabled.len());
//! }
//!
//! let action = config.action_options("jobs-ingestor", Some("ingestors"))?;
//! println!("{} uses {}", action.name, action.options_class);
//! # Ok::<(), etl_config::ConfigError>(())
//! ```
//!
//! # Generic Configuration
//!
//! Configurations without ETL semantics get comment stripping, references,
//! variables and local merging through [`GenericConfiguration`]:
//!
//! ```no_run
//! use etl_config::{ConfigOptions, GenericConfiguration};
//!
//! let config = GenericConfiguration::load(
//!     "portal_settings.json",
//!     ConfigOptions::new().with_variable("log_dir", "/var/log/etl"),
//! )?;
//! if let Some(logging) = config.section("logging") {
//!     println!("{}", logging);
//! }
//! # Ok::<(), etl_config::ConfigError>(())
//! ```
//!
//! # Error Handling
//!
//! Every failure is a [`ConfigError`] naming the file and, where it applies,
//! the section, action or pointer involved:
//!
//! ```no_run
//! use etl_config::{ConfigError, EtlConfigOptions, EtlConfiguration};
//!
//! match EtlConfiguration::load("etl.json", EtlConfigOptions::new()) {
//!     Ok(config) => println!("{} sections", config.section_names().len()),
//!     Err(ConfigError::DuplicateAction { action, section, path }) => {
//!         eprintln!("{} defined twice in {} ({})", action, section, path.display());
//!     }
//!     Err(err) => eprintln!("Configuration error: {}", err),
//! }
//! ```

/// The resolution pipeline and generic configurations
pub mod configuration;
/// Loading and merging JSON documents
pub mod document;
/// Error types and handling
pub mod error;
/// ETL pipeline sections, actions and endpoints
pub mod etl;
/// Path qualification
pub mod paths;
/// JSON pointers
pub mod pointer;
/// Named sections with a cursor
pub mod sections;
/// Key transformers
pub mod transform;
/// `${name}` variables
pub mod variables;

// Re-export main types for easier access
pub use configuration::{
    ConfigOptions, ConfigState, Configuration, ConfigurationCore, GenericConfiguration,
};
pub use error::{ConfigError, ConfigResult};
pub use etl::{
    ActionKind, ActionName, ActionOptions, DataEndpoint, EndpointRegistry, EtlConfigOptions,
    EtlConfiguration, OptionOverride, OptionsClass, OptionsClassRegistry,
};
pub use pointer::JsonPointer;
pub use sections::SectionStore;
pub use transform::{
    KeyTransformer, ReferenceTarget, TransformContext, TransformEngine, Transformation,
};
pub use variables::VariableStore;
