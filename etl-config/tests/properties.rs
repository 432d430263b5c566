//! Property tests for pointers, variables, overrides and the transform engine

use etl_config::etl::overrides::interpret_override_value;
use etl_config::{JsonPointer, TransformContext, TransformEngine, VariableStore};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

proptest! {
    #[test]
    fn pointer_round_trips_escaped_keys(key in "[a-zA-Z0-9_~/ .-]{0,12}", n in any::<i64>()) {
        let mut inner = Map::new();
        inner.insert(key.clone(), json!(n));
        let document = json!({"outer": inner});

        let pointer = JsonPointer::parse(&format!("/outer/{}", escape_segment(&key))).unwrap();
        prop_assert_eq!(pointer.segments(), &["outer".to_string(), key][..]);
        prop_assert_eq!(pointer.resolve(&document).unwrap(), &json!(n));
    }

    #[test]
    fn pointer_indexes_arrays(items in prop::collection::vec(any::<u32>(), 1..20), pick in any::<prop::sample::Index>()) {
        let index = pick.index(items.len());
        let document = json!({"items": items.clone()});

        let pointer = JsonPointer::parse(&format!("/items/{}", index)).unwrap();
        prop_assert_eq!(pointer.resolve(&document).unwrap(), &json!(items[index]));

        let past_end = JsonPointer::parse(&format!("/items/{}", items.len())).unwrap();
        prop_assert!(past_end.resolve(&document).is_err());
    }

    #[test]
    fn substitution_is_idempotent(
        input in r"[a-z /]{0,6}(\$\{(alpha|beta|gamma)\})?[a-z /]{0,6}(\$\{(alpha|delta)\})?",
        alpha in "[a-z/]{0,8}",
        beta in "[a-z/]{0,8}",
    ) {
        let variables: VariableStore = [("alpha", alpha), ("beta", beta)].into_iter().collect();
        let once = variables.substitute(&input);
        prop_assert_eq!(variables.substitute(&once), once.clone());
        prop_assert!(!once.contains("${alpha}"), "substituted output still contains the alpha placeholder");
        prop_assert!(!once.contains("${beta}"), "substituted output still contains the beta placeholder");
    }

    #[test]
    fn integer_overrides_become_numbers(n in any::<i64>()) {
        prop_assert_eq!(interpret_override_value(&n.to_string()), json!(n));
    }

    #[test]
    fn bare_words_stay_strings(word in "[a-zA-Z][a-zA-Z_]{0,10}") {
        prop_assume!(!["true", "false", "null"].contains(&word.to_ascii_lowercase().as_str()));
        prop_assert_eq!(interpret_override_value(&word), Value::String(word.clone()));
    }

    #[test]
    fn comment_keys_never_survive(entries in prop::collection::btree_map("#?[a-z]{1,6}", any::<i32>(), 0..12)) {
        let object: Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        let document = json!({"nested": [Value::Object(object.clone())], "top": Value::Object(object)});

        let engine = TransformEngine::with_defaults();
        let context = TransformContext::new(std::env::temp_dir());
        let transformed = engine.transform(document.clone(), &context).unwrap();
        // Reference-free documents always transform the same way.
        prop_assert_eq!(&engine.transform(document, &context).unwrap(), &transformed);

        let expected: BTreeMap<&String, &i32> =
            entries.iter().filter(|(k, _)| !k.starts_with('#')).collect();
        let top = transformed["top"].as_object().unwrap();
        prop_assert_eq!(top.len(), expected.len());
        for (key, value) in expected {
            prop_assert_eq!(&top[key.as_str()], &json!(value));
        }
        prop_assert_eq!(&transformed["nested"][0], &transformed["top"]);
    }
}
