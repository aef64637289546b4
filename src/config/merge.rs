//! Field-by-field merging of configuration tiers.
//!
//! Objects merge key by key; arrays and scalars from the higher tier
//! replace the lower tier outright. A `null` in the higher tier means
//! "not specified" and keeps the lower value.

use serde_json::Value;

/// Merge `overlay` into `base`, with `overlay` taking precedence.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

fn merge_into(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Null => {}
        Value::Object(entries) => {
            if let Value::Object(target) = base {
                for (key, value) in entries {
                    match target.get_mut(&key) {
                        Some(existing) => merge_into(existing, value),
                        None => {
                            target.insert(key, value);
                        }
                    }
                }
            } else {
                *base = Value::Object(entries);
            }
        }
        other => *base = other,
    }
}

/// Merge tiers lowest first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
