//! Field value containers shared by entities and stores.
//!
//! Values are `serde_json::Value`s. Maps are `BTreeMap`s so that iteration,
//! serialization and therefore content hashing are deterministic.

use std::collections::BTreeMap;

use serde_json::Value;

/// Field name -> value snapshot of one entity.
pub type FieldMap = BTreeMap<String, Value>;

/// One row as returned by a store. Same shape as a [`FieldMap`].
pub type Row = FieldMap;

/// Reads a value as an integer, accepting integral numbers and numeric strings.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Equality that treats `5`, `5.0` and `"5"` as the same value.
///
/// Stores compare filter values this way so that ids read from one table
/// match foreign keys in another regardless of how they were encoded.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_i64(a), as_i64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
    }
}
