//! Flat encoding of nested maps.

use fluxion_core::{FlatKeyPath, FlatModel};
use serde_json::Value;

/// Flatten a nested map into one entry per leaf, keyed by flat key path.
///
/// Objects recurse per key; arrays recurse per element with the decimal
/// index as the segment; scalars emit a leaf at the current path. `Null`
/// leaves are omitted, the way a codec drops absent optionals, which is
/// what lets "set to null" surface as `Removed` in a diff.
///
/// Keys that are empty or contain the `/` separator cannot be addressed
/// by a flat path; they are logged at `warn` and skipped, and the rest of
/// the traversal continues.
pub fn flatten(value: &Value) -> FlatModel {
    let mut out = FlatModel::new();
    walk(value, FlatKeyPath::root(), &mut out);
    out
}

fn walk(value: &Value, path: FlatKeyPath, out: &mut FlatModel) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.is_empty() || key.contains('/') {
                    tracing::warn!(path = %path, key = %key, "skipping malformed key");
                    continue;
                }
                walk(child, path.child(key.as_str()), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, path.child(index), out);
            }
        }
        Value::Null => {}
        leaf => {
            out.insert(path, leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(flat: &FlatModel) -> Vec<String> {
        flat.keys().map(|p| p.to_string()).collect()
    }

    fn path(s: &str) -> FlatKeyPath {
        s.parse().unwrap()
    }

    #[test]
    fn scalars_emit_leaves() {
        let flat = flatten(&json!({"count": 42, "label": "Foo", "on": true}));
        assert_eq!(paths(&flat), ["count", "label", "on"]);
        assert_eq!(flat[&path("count")], json!(42));
    }

    #[test]
    fn nested_maps_extend_the_path() {
        let flat = flatten(&json!({"todo": {"done": false, "name": "Buy milk"}}));
        assert_eq!(paths(&flat), ["todo/done", "todo/name"]);
    }

    #[test]
    fn arrays_index_by_position() {
        let flat = flatten(&json!({"items": [{"name": "a"}, {"name": "b"}], "tags": [1, 2]}));
        assert_eq!(
            paths(&flat),
            ["items/0/name", "items/1/name", "tags/0", "tags/1"]
        );
    }

    #[test]
    fn null_leaves_are_omitted() {
        let flat = flatten(&json!({"label": "Foo", "nullableLabel": null}));
        assert_eq!(paths(&flat), ["label"]);
    }

    #[test]
    fn malformed_keys_are_skipped() {
        let flat = flatten(&json!({"": 1, "a/b": 2, "ok": 3}));
        assert_eq!(paths(&flat), ["ok"]);
    }

    #[test]
    fn empty_containers_emit_nothing() {
        let flat = flatten(&json!({"a": {}, "b": []}));
        assert!(flat.is_empty());
    }
}
