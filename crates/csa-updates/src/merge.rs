//! Recursive dict-merge of a JSON merge patch into a target document
//! (spec §4.8 `apply`).

use serde_json::Value;

/// Merge `patch` into `target` in place: objects merge key-by-key
/// recursively; any other value (including arrays) in `patch` replaces
/// the corresponding value in `target` wholesale.
pub fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_into(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}
