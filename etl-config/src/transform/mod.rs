//! Key transformers and the engine that applies them
//!
//! A [`KeyTransformer`] looks at a single key of an object and decides what
//! happens to the key/value pair. The [`TransformEngine`] walks a document
//! depth-first and offers every key of every object to each registered
//! transformer, in registration order.

mod comment;
mod engine;
mod reference;

pub use comment::CommentStripper;
pub use engine::TransformEngine;
pub use reference::{JsonReferenceResolver, MacroJsonReferenceResolver, REFERENCE_KEY};

use crate::variables::VariableStore;
use crate::ConfigResult;
use serde_json::{Map, Value};
use std::fmt::{self, Debug, Display};
use std::path::{Path, PathBuf};

/// What a transformer does with the key it matched.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// Remove the pair from the object.
    Delete,
    /// Replace the entire enclosing object with this value.
    ReplaceObject(Value),
    /// Write back a key and value, either of which may be unchanged.
    Replace { key: String, value: Value },
}

/// A location a reference points at, `document#pointer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub document: PathBuf,
    pub pointer: String,
}

impl Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document.display(), self.pointer)
    }
}

/// Result of applying a transformer to one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub action: KeyAction,
    /// When false, no further transformers are consulted for this key.
    pub continue_processing: bool,
    /// Set when the replacement was loaded from a reference. The replacement
    /// is transformed with this target marked as in progress.
    pub reference: Option<ReferenceTarget>,
}

impl Transformation {
    pub fn delete() -> Self {
        Self {
            action: KeyAction::Delete,
            continue_processing: false,
            reference: None,
        }
    }

    pub fn replace_object(value: Value) -> Self {
        Self {
            action: KeyAction::ReplaceObject(value),
            continue_processing: false,
            reference: None,
        }
    }

    pub fn replace(key: impl Into<String>, value: Value) -> Self {
        Self {
            action: KeyAction::Replace {
                key: key.into(),
                value,
            },
            continue_processing: true,
            reference: None,
        }
    }

    /// Record the reference the replacement came from.
    pub fn from_reference(mut self, target: ReferenceTarget) -> Self {
        self.reference = Some(target);
        self
    }

    /// Stop consulting further transformers for this key.
    pub fn stop(mut self) -> Self {
        self.continue_processing = false;
        self
    }
}

/// The view of the owning configuration a transformer is given.
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    /// Directory relative references are resolved against.
    pub base_dir: PathBuf,
    /// File being transformed, for error messages.
    pub document: PathBuf,
    pub variables: VariableStore,
    /// References being expanded, outermost first.
    resolving: Vec<ReferenceTarget>,
}

impl TransformContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            document: base_dir.clone(),
            base_dir,
            variables: VariableStore::new(),
            resolving: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: impl Into<PathBuf>) -> Self {
        self.document = document.into();
        self
    }

    pub fn with_variables(mut self, variables: VariableStore) -> Self {
        self.variables = variables;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The chain of references leading to `target` if it is already being
    /// expanded, ending with `target` itself.
    pub fn reference_cycle<'a>(&'a self, target: &'a ReferenceTarget) -> Option<Vec<&'a ReferenceTarget>> {
        let start = self.resolving.iter().position(|t| t == target)?;
        let mut cycle: Vec<&ReferenceTarget> = self.resolving[start..].iter().collect();
        cycle.push(target);
        Some(cycle)
    }

    /// A context for transforming the content loaded from `target`.
    pub fn entering(&self, target: ReferenceTarget) -> Self {
        let mut context = self.clone();
        context.resolving.push(target);
        context
    }
}

/// A rule that matches object keys and rewrites the key/value pair.
pub trait KeyTransformer: Debug + Send + Sync {
    /// Registration name, unique within an engine.
    fn name(&self) -> &str;

    fn matches(&self, key: &str) -> bool;

    /// Transform `key`/`value`. `enclosing` is the object the key was found in,
    /// as it appeared before this pass.
    fn transform(
        &self,
        key: &str,
        value: Value,
        enclosing: &Map<String, Value>,
        context: &TransformContext,
    ) -> ConfigResult<Transformation>;
}
