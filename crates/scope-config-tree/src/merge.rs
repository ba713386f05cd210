//! Pure deep-merge of configuration overlays.

use serde_json::Value;

/// Deep-merge `overlay` onto `base`.
///
/// - Two objects merge key by key, recursively.
/// - A `null` value in `overlay` deletes the corresponding key from `base`.
/// - Arrays, and any other type mismatch, are replaced wholesale by
///   `overlay` — arrays never concatenate.
#[must_use]
pub fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut b), Value::Object(o)) => {
            for (k, v) in o {
                if v.is_null() {
                    b.remove(&k);
                } else {
                    let merged = match b.remove(&k) {
                        Some(existing) => merge(existing, v),
                        None => v,
                    };
                    b.insert(k, merged);
                }
            }
            Value::Object(b)
        }
        (_, overlay) => overlay,
    }
}

/// Fold a root-to-leaf sequence of overlays into one effective config,
/// starting from an empty object.
#[must_use]
pub fn merge_chain<'a>(overlays: impl IntoIterator<Item = &'a Value>) -> Value {
    overlays
        .into_iter()
        .cloned()
        .fold(Value::Object(serde_json::Map::new()), merge)
}
