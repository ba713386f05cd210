//! Dotted-path utilities: flattening a proposed JSON diff into leaf paths,
//! and translating the dotted notation into the slash-separated notation
//! `scope-config-glob`'s matchers expect.

use serde_json::Value;

/// Flatten `value` (a JSON object, typically a proposed config diff) into
/// `(dotted.path, leaf_value)` pairs. Nested objects recurse; arrays are
/// treated as a single leaf at their own path (locking/clamping an array as
/// a whole, not element-by-element).
pub fn flatten_leaves(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&path, child, out);
            }
        }
        _ => out.push((prefix.to_string(), value.clone())),
    }
}

/// Translate a dotted config path (`"agents.sre.prompt.system"`) into the
/// slash-separated form `scope-config-glob`'s `GlobSet` matchers operate on
/// (`"agents/sre/prompt/system"`).
pub fn dotted_to_glob_path(path: &str) -> String {
    path.replace('.', "/")
}

/// Build the pair of exclude-glob patterns (in slash notation) that make
/// `locked_path` lock both itself and every path nested under it, per the
/// spec's "`a.b` locks `a.b.*`" rule.
pub fn locked_path_patterns(locked_path: &str) -> [String; 2] {
    let base = dotted_to_glob_path(locked_path);
    let nested = format!("{base}/*");
    [base, nested]
}
