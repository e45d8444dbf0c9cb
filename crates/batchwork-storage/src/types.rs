//! Storage-layer value types: row filters and index descriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use batchwork_core::value::loosely_equal;
use batchwork_core::Row;

/// Conjunction of `column = value` conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Filter::default()
    }

    /// Single `column = value` condition.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::all().and(column, value)
    }

    /// Adds another `column = value` condition.
    pub fn and(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Evaluates the filter against a row. Missing columns compare as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            let actual = row.get(column).unwrap_or(&Value::Null);
            loosely_equal(actual, expected)
        })
    }
}

/// One index of a table and the columns it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexInfo {
    pub fn covers(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_filter_matches() {
        let r = row(json!({"id": 3, "waveid": 7, "name": "c"}));
        assert!(Filter::all().matches(&r));
        assert!(Filter::eq("waveid", 7).matches(&r));
        assert!(Filter::eq("waveid", "7").matches(&r));
        assert!(!Filter::eq("waveid", 7).and("name", "d").matches(&r));
        assert!(!Filter::eq("missing", 1).matches(&r));
    }

    #[test]
    fn test_index_covers() {
        let idx = IndexInfo {
            name: "ix".into(),
            columns: vec!["waveid".into(), "name".into()],
            unique: false,
        };
        assert!(idx.covers("waveid"));
        assert!(!idx.covers("id"));
    }
}
