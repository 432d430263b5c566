//! Error types for ETL configuration resolution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration-related errors
///
/// Every variant aborts resolution of the file being processed. Variants carry
/// enough context (file path, section, action, pointer) to locate the offending
/// configuration block.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file or directory not found
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read configuration file
    #[error("failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON
    #[error("failed to parse {path} at line {line}, column {column}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Resolved document could not be written back out as JSON
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally invalid configuration
    #[error("invalid configuration in {path}: {message}")]
    Schema { path: PathBuf, message: String },

    /// JSON pointer that does not resolve in its target document
    #[error("JSON pointer '{pointer}' in {document}: {message}")]
    Reference {
        pointer: String,
        document: PathBuf,
        message: String,
    },

    /// Action registered twice in the same section
    #[error("action '{action}' is already defined in section '{section}' ({path})")]
    DuplicateAction {
        action: String,
        section: String,
        path: PathBuf,
    },

    /// No options class given and none implied by the section
    #[error("no options class for action '{action}' in section '{section}'{}", describe_options_class(.options_class))]
    MissingOptionsClass {
        action: String,
        section: String,
        options_class: Option<String>,
    },

    /// Options class does not describe action options
    #[error("options class '{options_class}' for action '{action}' in section '{section}' is not an action options class")]
    InvalidOptionsClass {
        action: String,
        section: String,
        options_class: String,
    },

    /// Unscoped action lookup matched more than one section
    #[error("action '{action}' is defined in multiple sections ({}), specify a section", .sections.join(", "))]
    AmbiguousAction {
        action: String,
        sections: Vec<String>,
    },

    /// Action lookup found nothing
    #[error("action '{action}' not found{}", describe_section(.section))]
    ActionNotFound {
        action: String,
        section: Option<String>,
    },

    /// Option override not in `key=value` form
    #[error("invalid option override '{raw}', expected KEY=VALUE")]
    InvalidOverride { raw: String },
}

fn describe_options_class(options_class: &Option<String>) -> String {
    match options_class {
        Some(name) => format!(": '{}' is not registered", name),
        None => String::new(),
    }
}

fn describe_section(section: &Option<String>) -> String {
    match section {
        Some(name) => format!(" in section '{}'", name),
        None => String::new(),
    }
}

impl ConfigError {
    /// Create a FileRead error, mapping a missing file to NotFound.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::FileRead { path, source },
        }
    }

    /// Create a Parse error from a serde_json error.
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            line: source.line(),
            column: source.column(),
            source,
        }
    }

    /// Create a Serialize error.
    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }

    /// Create a Schema error.
    pub fn schema(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Reference error.
    pub fn reference(
        pointer: impl Into<String>,
        document: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Reference {
            pointer: pointer.into(),
            document: document.into(),
            message: message.into(),
        }
    }
}
