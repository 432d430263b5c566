//! JSON Pointer parsing and evaluation
//!
//! Pointers follow the slash-delimited syntax of RFC 6901 as it appears in the
//! fragment of a `$ref` URI: every segment is percent-decoded first and then
//! un-escaped (`~1` to `/`, then `~0` to `~`).
//!
//! Two conveniences beyond plain RFC 6901 are supported:
//!
//! - a `-` segment applied to an array selects its last element
//! - a numeric segment applied to an object is looked up as an ordinary key

use crate::{ConfigError, ConfigResult};
use serde_json::Value;
use std::path::{Path, PathBuf};

const INLINE_DOCUMENT: &str = "<inline>";

/// A parsed JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointer {
    raw: String,
    segments: Vec<String>,
    document: PathBuf,
}

impl JsonPointer {
    /// Parse a pointer string.
    ///
    /// The empty string refers to the whole document. Any other pointer must
    /// start with `/`.
    pub fn parse(pointer: &str) -> ConfigResult<Self> {
        let document = PathBuf::from(INLINE_DOCUMENT);

        if pointer.is_empty() {
            return Ok(Self {
                raw: String::new(),
                segments: Vec::new(),
                document,
            });
        }

        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(ConfigError::reference(
                pointer,
                document,
                "pointer must be empty or start with '/'",
            ));
        };

        let segments = rest
            .split('/')
            .map(|segment| decode_segment(pointer, segment, &document))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            raw: pointer.to_string(),
            segments,
            document,
        })
    }

    /// Name the document this pointer is evaluated against, for error messages.
    pub fn with_document(mut self, document: impl Into<PathBuf>) -> Self {
        self.document = document.into();
        self
    }

    /// The pointer exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decoded reference tokens.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the pointer selects the whole document.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk `value` one segment at a time.
    ///
    /// Any segment that does not exist fails with a reference error naming the
    /// complete pointer.
    pub fn resolve<'a>(&self, value: &'a Value) -> ConfigResult<&'a Value> {
        let mut current = value;

        for segment in &self.segments {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) if segment == "-" => items.last(),
                Value::Array(items) => parse_index(segment).and_then(|index| items.get(index)),
                _ => None,
            };

            current = next.ok_or_else(|| self.nonexistent())?;
        }

        Ok(current)
    }

    fn nonexistent(&self) -> ConfigError {
        ConfigError::reference(
            &self.raw,
            &self.document,
            format!("JSON pointer '{}' references a nonexistent value", self.raw),
        )
    }
}

impl std::fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn decode_segment(pointer: &str, segment: &str, document: &Path) -> ConfigResult<String> {
    let decoded = urlencoding::decode(segment).map_err(|e| {
        ConfigError::reference(
            pointer,
            document,
            format!("segment '{}' is not valid percent-encoded UTF-8: {}", segment, e),
        )
    })?;
    Ok(decoded.replace("~1", "/").replace("~0", "~"))
}

// RFC 6901 forbids leading zeros in array indices.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Extract the subtree of `document` selected by `fragment`.
///
/// `document_path` only appears in error messages.
pub fn extract_fragment(
    document: &Value,
    fragment: &str,
    document_path: impl AsRef<Path>,
) -> ConfigResult<Value> {
    let pointer = JsonPointer::parse(fragment)
        .map_err(|e| relabel(e, document_path.as_ref()))?
        .with_document(document_path.as_ref());
    pointer.resolve(document).cloned()
}

fn relabel(err: ConfigError, path: &Path) -> ConfigError {
    match err {
        ConfigError::Reference {
            pointer, message, ..
        } => ConfigError::reference(pointer, path, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "x": [{"v": 1}, {"v": 2}],
            "a/b": "slash",
            "m~n": "tilde",
            "10": "numeric key",
            "with space": true
        })
    }

    #[test]
    fn test_empty_pointer_is_whole_document() {
        let doc = sample();
        let pointer = JsonPointer::parse("").unwrap();
        assert!(pointer.is_root());
        assert_eq!(pointer.resolve(&doc).unwrap(), &doc);
    }

    #[test]
    fn test_array_index_and_last_element() {
        let doc = sample();
        assert_eq!(
            extract_fragment(&doc, "/x/0", "b.json").unwrap(),
            json!({"v": 1})
        );
        assert_eq!(extract_fragment(&doc, "/x/-/v", "b.json").unwrap(), json!(2));
    }

    #[test]
    fn test_escapes_and_percent_decoding() {
        let doc = sample();
        assert_eq!(extract_fragment(&doc, "/a~1b", "d").unwrap(), json!("slash"));
        assert_eq!(extract_fragment(&doc, "/m~0n", "d").unwrap(), json!("tilde"));
        assert_eq!(extract_fragment(&doc, "/with%20space", "d").unwrap(), json!(true));
    }

    #[test]
    fn test_numeric_segment_on_object_is_a_key() {
        let doc = sample();
        assert_eq!(
            extract_fragment(&doc, "/10", "d").unwrap(),
            json!("numeric key")
        );
    }

    #[test]
    fn test_missing_segment_names_full_pointer() {
        let doc = sample();
        for pointer in ["/x/2", "/x/01", "/nope/deeper", "/x/0/v/w", "/x/last"] {
            match extract_fragment(&doc, pointer, "/etc/etl/b.json").unwrap_err() {
                ConfigError::Reference {
                    pointer: reported,
                    document,
                    message,
                } => {
                    assert_eq!(reported, pointer);
                    assert_eq!(document, PathBuf::from("/etc/etl/b.json"));
                    assert!(message.contains(pointer));
                }
                other => panic!("expected reference error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_pointer_must_start_with_slash() {
        let err = extract_fragment(&sample(), "x/0", "b.json").unwrap_err();
        match err {
            ConfigError::Reference { document, .. } => {
                assert_eq!(document, PathBuf::from("b.json"))
            }
            other => panic!("expected reference error, got {other:?}"),
        }
    }

    #[test]
    fn test_dash_on_empty_array_fails() {
        let doc = json!({"empty": []});
        assert!(extract_fragment(&doc, "/empty/-", "d").is_err());
    }
}
