//! Map merge helpers shared by the identity and rules layers.
//!
//! The two layers intentionally merge differently: preferences overlay
//! recursively, wall maps replace whole keys.

use serde_json::{Map, Value};

/// Recursively overlay `updates` onto `base`.
///
/// Nested objects present on both sides are merged key by key; any other
/// value in `updates` replaces the one in `base`.
pub fn deep_merge(base: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (key, value) in updates {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Key-level replace: every key in `updates` overwrites `base` wholesale.
pub fn shallow_merge(base: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (key, value) in updates {
        base.insert(key.clone(), value.clone());
    }
}
