use super::{KeyTransformer, TransformContext, Transformation};
use crate::ConfigResult;
use serde_json::{Map, Value};

const COMMENT_PREFIX: char = '#';

/// Removes comment keys, any key beginning with `#`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentStripper;

impl CommentStripper {
    pub const NAME: &'static str = "comment";
}

impl KeyTransformer for CommentStripper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, key: &str) -> bool {
        key.starts_with(COMMENT_PREFIX)
    }

    fn transform(
        &self,
        _key: &str,
        _value: Value,
        _enclosing: &Map<String, Value>,
        _context: &TransformContext,
    ) -> ConfigResult<Transformation> {
        Ok(Transformation::delete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_hash_prefixed_keys() {
        let stripper = CommentStripper;
        assert!(stripper.matches("#"));
        assert!(stripper.matches("#note"));
        assert!(!stripper.matches("note#"));
        assert!(!stripper.matches("$ref"));
    }
}
