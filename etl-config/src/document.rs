//! Loading JSON configuration documents
//!
//! A document is a `serde_json::Value`. Objects preserve the key order of the
//! source file so that serialized output follows the configuration as written.

use crate::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, trace};

/// Read and parse a JSON document.
///
/// # Errors
///
/// * [`ConfigError::NotFound`] if the file does not exist
/// * [`ConfigError::FileRead`] if it exists but cannot be read
/// * [`ConfigError::Parse`] if the content is not valid JSON, with the line and
///   column reported by the parser
pub fn load_document(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    debug!("Loading JSON document {}", path.display());

    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::file_read(path, e))?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| ConfigError::parse(path, e))?;

    trace!("Parsed {} ({} bytes)", path.display(), content.len());
    Ok(document)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects are merged key by key at every depth with `overlay` winning on
/// collisions. Anything else (arrays, scalars, or an object meeting a non-object)
/// is replaced wholesale by the overlay value.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_maps(base_map, overlay_map);
        }
        (base, overlay) => *base = overlay,
    }
}

fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Short human readable name of a value's JSON type, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_document_preserves_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("etl.json");
        fs::write(&path, r#"{"zeta": 1, "alpha": 2, "mid": {"b": 1, "a": 2}}"#).unwrap();

        let doc = load_document(&path).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        let nested: Vec<&String> = doc["mid"].as_object().unwrap().keys().collect();
        assert_eq!(nested, ["b", "a"]);
    }

    #[test]
    fn test_load_missing_document() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_document(temp_dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_malformed_document_reports_position() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{\n  \"a\": 1,\n  \"b\": \n}").unwrap();

        match load_document(&path).unwrap_err() {
            ConfigError::Parse {
                path: err_path,
                line,
                ..
            } => {
                assert_eq!(err_path, path);
                assert_eq!(line, 4);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_merge_overlay_wins_at_every_depth() {
        let mut base = json!({
            "global": {"enabled": false, "paths": {"data_dir": "/a", "log_dir": "/l"}},
            "ingestors": {"truncate": true}
        });
        deep_merge(
            &mut base,
            json!({
                "global": {"paths": {"data_dir": "/b"}},
                "aggregators": {"enabled": true}
            }),
        );

        assert_eq!(
            base,
            json!({
                "global": {"enabled": false, "paths": {"data_dir": "/b", "log_dir": "/l"}},
                "ingestors": {"truncate": true},
                "aggregators": {"enabled": true}
            })
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base = json!({"units": ["day", "month"]});
        deep_merge(&mut base, json!({"units": ["year"]}));
        assert_eq!(base, json!({"units": ["year"]}));
    }
}
