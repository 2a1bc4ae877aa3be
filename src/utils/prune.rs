// src/utils/prune.rs

//! Empty-value pruning for JSON output.

use serde_json::Value;

/// Whether a value carries nothing worth writing.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Recursively drop `null`, `[]` and `{}` from objects and arrays.
///
/// Children are pruned first, so a container that only held empty values
/// disappears as well. Empty strings and zeros are kept.
pub fn prune_empty(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key, prune_empty(child)))
                .filter(|(_, child)| !is_empty_value(child))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(prune_empty)
                .filter(|child| !is_empty_value(child))
                .collect(),
        ),
        other => other,
    }
}
