use super::{KeyTransformer, ReferenceTarget, TransformContext, Transformation};
use crate::document::load_document;
use crate::pointer::extract_fragment;
use crate::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// The key marking a JSON reference.
pub const REFERENCE_KEY: &str = "$ref";

/// Replaces `{"$ref": "file.json#/pointer"}` with the value it points to.
///
/// The reference must be the only key of its object. Relative document paths
/// are resolved against the configuration's base directory. The fragment, when
/// present, is evaluated as a JSON pointer into the loaded document; without a
/// fragment the whole document is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReferenceResolver;

impl JsonReferenceResolver {
    pub const NAME: &'static str = "json_reference";
}

impl KeyTransformer for JsonReferenceResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, key: &str) -> bool {
        key == REFERENCE_KEY
    }

    fn transform(
        &self,
        _key: &str,
        value: Value,
        enclosing: &Map<String, Value>,
        context: &TransformContext,
    ) -> ConfigResult<Transformation> {
        let reference = reference_string(value, enclosing, context)?;
        resolve_reference(&reference, context)
    }
}

/// A [`JsonReferenceResolver`] that first substitutes `${name}` variables in
/// the reference, so that `{"$ref": "${table_defn_dir}/jobs.json"}` works.
///
/// Registered under the same name as the plain resolver so it can take its
/// place in an engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacroJsonReferenceResolver;

impl KeyTransformer for MacroJsonReferenceResolver {
    fn name(&self) -> &str {
        JsonReferenceResolver::NAME
    }

    fn matches(&self, key: &str) -> bool {
        key == REFERENCE_KEY
    }

    fn transform(
        &self,
        _key: &str,
        value: Value,
        enclosing: &Map<String, Value>,
        context: &TransformContext,
    ) -> ConfigResult<Transformation> {
        let reference = reference_string(value, enclosing, context)?;
        let reference = context.variables.substitute(&reference);
        resolve_reference(&reference, context)
    }
}

fn reference_string(
    value: Value,
    enclosing: &Map<String, Value>,
    context: &TransformContext,
) -> ConfigResult<String> {
    if enclosing.len() > 1 {
        return Err(ConfigError::schema(
            &context.document,
            format!(
                "references cannot be mixed with other keys (found {})",
                enclosing
                    .keys()
                    .map(|k| format!("'{}'", k))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }

    match value {
        Value::String(reference) => Ok(reference),
        other => Err(ConfigError::schema(
            &context.document,
            format!(
                "'{}' must be a string, found {}",
                REFERENCE_KEY,
                crate::document::type_name(&other)
            ),
        )),
    }
}

fn resolve_reference(reference: &str, context: &TransformContext) -> ConfigResult<Transformation> {
    let (document_part, _) = reference.split_once('#').unwrap_or((reference, ""));
    if document_part.is_empty() {
        return Err(ConfigError::schema(
            &context.document,
            format!("reference '{}' does not name a document", reference),
        ));
    }

    let base = Url::from_directory_path(&context.base_dir).map_err(|_| {
        ConfigError::schema(
            &context.document,
            format!(
                "base directory {} cannot be used to resolve references",
                context.base_dir.display()
            ),
        )
    })?;

    let url = base.join(reference).map_err(|e| {
        ConfigError::schema(
            &context.document,
            format!("invalid reference '{}': {}", reference, e),
        )
    })?;

    if url.scheme() != "file" {
        return Err(ConfigError::schema(
            &context.document,
            format!(
                "reference '{}' uses unsupported scheme '{}'",
                reference,
                url.scheme()
            ),
        ));
    }

    let path = url.to_file_path().map_err(|_| {
        ConfigError::schema(
            &context.document,
            format!("reference '{}' does not resolve to a local file", reference),
        )
    })?;

    let target = ReferenceTarget {
        document: path,
        pointer: url.fragment().unwrap_or("").to_string(),
    };
    if let Some(cycle) = context.reference_cycle(&target) {
        return Err(ConfigError::reference(
            target.pointer.clone(),
            target.document.clone(),
            format!(
                "circular reference: {}",
                cycle
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
        ));
    }

    debug!("Resolving reference '{}' to {}", reference, target.document.display());
    let document = load_document(&target.document)?;
    let value = extract_fragment(&document, &target.pointer, &target.document)?;
    Ok(Transformation::replace_object(value).from_reference(target))
}
