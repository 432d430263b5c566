//! Default values for actions
//!
//! The `defaults` block maps `global` or a section name to properties that
//! actions inherit when they do not set them. Precedence, most specific first:
//! the action's own value, the section default, the global default.

use crate::document::{deep_merge, type_name};
use crate::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::Path;

pub const GLOBAL: &str = "global";

/// Properties merged entry by entry rather than inherited whole.
const MERGED_PROPERTIES: [&str; 2] = ["endpoints", "variables"];

/// Combine defaults inherited from a parent configuration with those declared
/// locally. Local values win at every depth.
pub fn merge_parent_defaults(parent: Option<&Value>, local: Option<Value>) -> Option<Value> {
    match (parent, local) {
        (Some(parent), Some(local)) => {
            let mut merged = parent.clone();
            deep_merge(&mut merged, local);
            Some(merged)
        }
        (Some(parent), None) => Some(parent.clone()),
        (None, local) => local,
    }
}

fn is_unset(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Fill in properties `action` lacks from `defaults`, section defaults first.
///
/// Actions that already declare `endpoints` or `variables` receive only the
/// entries they are missing. Endpoints without their own `paths` inherit the
/// global `paths` default.
pub fn apply_defaults_to_action(
    action: &mut Map<String, Value>,
    section: &str,
    defaults: &Map<String, Value>,
    source: &Path,
) -> ConfigResult<()> {
    for scope in [section, GLOBAL] {
        let Some(scope_defaults) = defaults.get(scope) else {
            continue;
        };
        let Value::Object(scope_defaults) = scope_defaults else {
            return Err(ConfigError::schema(
                source,
                format!(
                    "defaults for '{}' must be an object, found {}",
                    scope,
                    type_name(scope_defaults)
                ),
            ));
        };

        for (property, default) in scope_defaults {
            if is_unset(action.get(property)) {
                action.insert(property.clone(), default.clone());
            } else if MERGED_PROPERTIES.contains(&property.as_str()) {
                merge_entries(action, property, default, source)?;
            }
        }
    }

    let global_paths = defaults
        .get(GLOBAL)
        .and_then(|global| global.get("paths"))
        .filter(|paths| !paths.is_null());

    if let (Some(paths), Some(Value::Object(endpoints))) = (global_paths, action.get_mut("endpoints"))
    {
        for endpoint in endpoints.values_mut() {
            if let Value::Object(endpoint) = endpoint {
                if is_unset(endpoint.get("paths")) {
                    endpoint.insert("paths".to_string(), paths.clone());
                }
            }
        }
    }

    Ok(())
}

fn merge_entries(
    action: &mut Map<String, Value>,
    property: &str,
    default: &Value,
    source: &Path,
) -> ConfigResult<()> {
    let Value::Object(default_entries) = default else {
        return Err(ConfigError::schema(
            source,
            format!(
                "expected default '{}' to be an object, found {}",
                property,
                type_name(default)
            ),
        ));
    };

    match action.get_mut(property) {
        Some(Value::Object(entries)) => {
            for (name, value) in default_entries {
                if is_unset(entries.get(name)) {
                    entries.insert(name.clone(), value.clone());
                }
            }
            Ok(())
        }
        Some(other) => Err(ConfigError::schema(
            source,
            format!(
                "expected '{}' to be an object, found {}",
                property,
                type_name(other)
            ),
        )),
        None => Ok(()),
    }
}
