use super::{
    CommentStripper, JsonReferenceResolver, KeyAction, KeyTransformer, TransformContext,
};
use crate::ConfigResult;
use serde_json::{Map, Value};
use tracing::{trace, warn};

/// Applies registered key transformers to a document tree.
///
/// Transformers are consulted in registration order. Each call to
/// [`TransformEngine::transform`] builds a new tree; the input is consumed and
/// never mutated in place, so a transformer replacing its enclosing object
/// cannot leave the walk holding a stale node.
#[derive(Debug, Default)]
pub struct TransformEngine {
    transformers: Vec<Box<dyn KeyTransformer>>,
}

impl TransformEngine {
    /// An engine with no transformers; `transform` returns its input unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Comment stripping followed by plain `$ref` resolution.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register(CommentStripper);
        engine.register(JsonReferenceResolver);
        engine
    }

    /// Register a transformer at the end of the list.
    ///
    /// A transformer with the same name as one already registered replaces it in
    /// its existing position.
    pub fn register<T: KeyTransformer + 'static>(&mut self, transformer: T) {
        let name = transformer.name().to_string();
        if let Some(slot) = self.position(&name) {
            warn!("Key transformer '{}' already registered, replacing", name);
            self.transformers[slot] = Box::new(transformer);
        } else {
            trace!("Registered key transformer '{}'", name);
            self.transformers.push(Box::new(transformer));
        }
    }

    /// Swap the transformer registered as `name` for `transformer`, keeping its
    /// position. Returns false (and registers nothing) if `name` is unknown.
    pub fn replace<T: KeyTransformer + 'static>(&mut self, name: &str, transformer: T) -> bool {
        match self.position(name) {
            Some(slot) => {
                trace!(
                    "Replaced key transformer '{}' with '{}'",
                    name,
                    transformer.name()
                );
                self.transformers[slot] = Box::new(transformer);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(slot) => {
                self.transformers.remove(slot);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Registered names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.transformers.iter().position(|t| t.name() == name)
    }

    /// Transform a document.
    ///
    /// Objects have every key offered to the transformers and are then recursed
    /// into. Arrays have their object elements transformed; scalars and nested
    /// arrays inside arrays are left as they are.
    pub fn transform(&self, value: Value, context: &TransformContext) -> ConfigResult<Value> {
        match value {
            Value::Object(map) => self.transform_object(map, context),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => self.transform_object(map, context),
                    other => Ok(other),
                })
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar),
        }
    }

    fn transform_object(
        &self,
        original: Map<String, Value>,
        context: &TransformContext,
    ) -> ConfigResult<Value> {
        let mut result = Map::with_capacity(original.len());

        'keys: for (original_key, original_value) in &original {
            let mut key = original_key.clone();
            let mut value = original_value.clone();

            for transformer in &self.transformers {
                if !transformer.matches(&key) {
                    continue;
                }

                trace!("Applying '{}' to key '{}'", transformer.name(), key);
                let outcome = transformer.transform(&key, value, &original, context)?;

                match outcome.action {
                    KeyAction::Delete => continue 'keys,
                    KeyAction::ReplaceObject(replacement) => {
                        // Remaining siblings belong to the replaced object.
                        return match outcome.reference {
                            Some(target) => {
                                self.transform(replacement, &context.entering(target))
                            }
                            None => self.transform(replacement, context),
                        };
                    }
                    KeyAction::Replace {
                        key: new_key,
                        value: new_value,
                    } => {
                        key = new_key;
                        value = new_value;
                    }
                }

                if !outcome.continue_processing {
                    break;
                }
            }

            let value = self.transform(value, context)?;
            result.insert(key, value);
        }

        Ok(Value::Object(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transformation;
    use serde_json::json;

    /// Upper-cases keys starting with `up_`.
    #[derive(Debug)]
    struct Upcase;

    impl KeyTransformer for Upcase {
        fn name(&self) -> &str {
            "upcase"
        }
        fn matches(&self, key: &str) -> bool {
            key.starts_with("up_")
        }
        fn transform(
            &self,
            key: &str,
            value: Value,
            _enclosing: &Map<String, Value>,
            _context: &TransformContext,
        ) -> ConfigResult<Transformation> {
            Ok(Transformation::replace(key.to_uppercase(), value))
        }
    }

    /// Appends a marker to string values of any `UP_` key, optionally stopping.
    #[derive(Debug)]
    struct Mark {
        name: &'static str,
        stop: bool,
    }

    impl KeyTransformer for Mark {
        fn name(&self) -> &str {
            self.name
        }
        fn matches(&self, key: &str) -> bool {
            key.starts_with("UP_")
        }
        fn transform(
            &self,
            key: &str,
            value: Value,
            _enclosing: &Map<String, Value>,
            _context: &TransformContext,
        ) -> ConfigResult<Transformation> {
            let marked = match value {
                Value::String(s) => Value::String(format!("{s}+{}", self.name)),
                other => other,
            };
            let t = Transformation::replace(key, marked);
            Ok(if self.stop { t.stop() } else { t })
        }
    }

    /// Replaces its enclosing object with the value of the `inline` key.
    #[derive(Debug)]
    struct Inline;

    impl KeyTransformer for Inline {
        fn name(&self) -> &str {
            "inline"
        }
        fn matches(&self, key: &str) -> bool {
            key == "inline"
        }
        fn transform(
            &self,
            _key: &str,
            value: Value,
            _enclosing: &Map<String, Value>,
            _context: &TransformContext,
        ) -> ConfigResult<Transformation> {
            Ok(Transformation::replace_object(value))
        }
    }

    fn ctx() -> TransformContext {
        TransformContext::new("/tmp")
    }

    #[test]
    fn test_comments_removed_at_every_depth() {
        let engine = TransformEngine::with_defaults();
        let input = json!({
            "#": "top comment",
            "ingestors": [
                {"#why": "nested", "name": "a", "opts": {"#x": 1, "y": 2}},
                "scalar",
                ["#not-an-object-key"]
            ]
        });

        let out = engine.transform(input, &ctx()).unwrap();
        assert_eq!(
            out,
            json!({
                "ingestors": [
                    {"name": "a", "opts": {"y": 2}},
                    "scalar",
                    ["#not-an-object-key"]
                ]
            })
        );
    }

    #[test]
    fn test_transformers_run_in_registration_order_until_stop() {
        let mut engine = TransformEngine::new();
        engine.register(Upcase);
        engine.register(Mark {
            name: "first",
            stop: true,
        });
        engine.register(Mark {
            name: "second",
            stop: false,
        });

        let out = engine.transform(json!({"up_a": "v"}), &ctx()).unwrap();
        assert_eq!(out, json!({"UP_A": "v+first"}));
        assert_eq!(engine.names(), vec!["upcase", "first", "second"]);
    }

    #[test]
    fn test_register_same_name_replaces_in_place() {
        let mut engine = TransformEngine::with_defaults();
        engine.register(CommentStripper);
        assert_eq!(engine.names(), vec!["comment", "json_reference"]);

        assert!(engine.replace("comment", Upcase));
        assert_eq!(engine.names(), vec!["upcase", "json_reference"]);
        assert!(!engine.replace("missing", Inline));
        assert!(engine.remove("upcase"));
        assert!(!engine.contains("upcase"));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_replace_object_drops_siblings_and_recurses() {
        let mut engine = TransformEngine::new();
        engine.register(CommentStripper);
        engine.register(Inline);

        let input = json!({
            "outer": {
                "inline": {"kept": true, "#c": "stripped", "deeper": {"inline": [1, {"#d": 0}]}},
                "dropped": 1
            },
            "sibling": "stays"
        });

        let out = engine.transform(input, &ctx()).unwrap();
        assert_eq!(
            out,
            json!({
                "outer": {"kept": true, "deeper": [1, {}]},
                "sibling": "stays"
            })
        );
    }

    #[test]
    fn test_top_level_array_and_scalars() {
        let engine = TransformEngine::with_defaults();
        assert_eq!(
            engine
                .transform(json!([{"#": 1, "a": 2}, 3]), &ctx())
                .unwrap(),
            json!([{"a": 2}, 3])
        );
        assert_eq!(engine.transform(json!("x"), &ctx()).unwrap(), json!("x"));
    }

    #[test]
    fn test_empty_engine_is_identity() {
        let engine = TransformEngine::new();
        let input = json!({"#": 1, "$ref": "x.json"});
        assert_eq!(engine.transform(input.clone(), &ctx()).unwrap(), input);
    }
}
