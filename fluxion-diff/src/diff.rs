//! Comparison of two flat encodings.

use fluxion_core::{FlatKeyPath, FlatModel, PropertyDiff};
use serde_json::Value;
use std::collections::BTreeMap;

/// Compare two flat encodings and report per-path deltas.
///
/// Paths only in `new` are `Added`; paths in both with values that are not
/// dynamically equal are `Changed`; paths only in `old` are `Removed`.
pub fn diff(old: &FlatModel, new: &FlatModel) -> BTreeMap<FlatKeyPath, PropertyDiff> {
    let mut out = BTreeMap::new();

    for (path, new_value) in new {
        match old.get(path) {
            None => {
                out.insert(
                    path.clone(),
                    PropertyDiff::Added {
                        new: new_value.clone(),
                    },
                );
            }
            Some(old_value) if !values_equal(old_value, new_value) => {
                out.insert(
                    path.clone(),
                    PropertyDiff::Changed {
                        old: old_value.clone(),
                        new: new_value.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for path in old.keys() {
        if !new.contains_key(path) {
            out.insert(path.clone(), PropertyDiff::Removed);
        }
    }

    out
}

/// Dynamic equality over leaf values.
///
/// Numbers compare numerically, so integer and float encodings of the same
/// value are equal. Strings compare by equality (timestamps ride on their
/// string encoding). Two nulls are equal. Arrays compare element-wise.
/// Everything else, including mixed types and nested objects, is unequal:
/// an unknown comparison always emits a `Changed` entry.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => false,
    }
}

fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    // Integer representations compare exactly; anything involving a float
    // compares as f64.
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
