//! In-memory implementation of [`Store`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and for callers that
//! do not need persistence. Tables are `BTreeMap`s keyed by row id, so rows
//! come back in id order unless another ordering is requested.
//!
//! A transaction works on a private copy of the tables and writes it back on
//! commit. Raw statements passed to [`Store::execute`] are recorded but not
//! interpreted; tests can script failures for them with
//! [`InMemoryStore::fail_statements_starting_with`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use batchwork_core::schema::ID_FIELD;
use batchwork_core::{FieldMap, Row};

use crate::error::StorageError;
use crate::traits::{writable_columns, Store, Transaction};
use crate::types::{Filter, IndexInfo};

/// Rows and id counter of a single table.
#[derive(Debug, Clone, Default)]
struct MemTable {
    rows: BTreeMap<i64, Row>,
    next_id: i64,
    indexes: Vec<IndexInfo>,
}

impl MemTable {
    fn insert(&mut self, fields: &FieldMap) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let mut row: Row = writable_columns(fields)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        row.insert(ID_FIELD.to_string(), Value::from(id));
        self.rows.insert(id, row);
        id
    }
}

/// In-memory backend with the same observable semantics as the SQLite one.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: BTreeMap<String, MemTable>,
    /// Tables whose writes fail, with the failure reason.
    rejected: HashMap<String, String>,
    /// Statement prefixes whose execution fails, with the error message.
    statement_errors: Vec<(String, String)>,
    executed: Vec<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Creates an empty table. Creating an existing table is a no-op.
    pub fn create_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    /// Inserts a row directly, outside any transaction. Used to seed data.
    pub fn seed(&mut self, table: &str, fields: FieldMap) -> Result<i64, StorageError> {
        let t = self.table_mut(table)?;
        Ok(t.insert(&fields))
    }

    /// Declares an index on `table`.
    pub fn add_index(&mut self, table: &str, name: &str, columns: &[&str]) -> Result<(), StorageError> {
        let t = self.table_mut(table)?;
        t.indexes.push(IndexInfo {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        });
        Ok(())
    }

    /// Makes every later write to `table` fail with `reason`.
    pub fn reject_writes_to(&mut self, table: &str, reason: &str) {
        self.rejected.insert(table.to_string(), reason.to_string());
    }

    /// Makes every later statement starting with `prefix` fail with `message`.
    pub fn fail_statements_starting_with(&mut self, prefix: &str, message: &str) {
        self.statement_errors
            .push((prefix.to_string(), message.to_string()));
    }

    /// Statements passed to [`Store::execute`], in call order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// All rows of `table` in id order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemTable, StorageError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })
    }
}

/// Orders two values the way an `ORDER BY` on that column would: nulls first,
/// then numbers, then strings.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl Store for InMemoryStore {
    fn fetch_rows(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>, StorageError> {
        let t = self
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })?;
        let mut rows: Vec<Row> = t
            .rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        if let Some(column) = order_by {
            // Stable sort keeps id order among equal keys.
            rows.sort_by(|a, b| {
                let a = a.get(column).unwrap_or(&Value::Null);
                let b = b.get(column).unwrap_or(&Value::Null);
                compare_values(a, b)
            });
        }
        Ok(rows)
    }

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StorageError> {
        let staged = self.tables.clone();
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged,
        }))
    }

    fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>, StorageError> {
        self.tables
            .get(table)
            .map(|t| t.indexes.clone())
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })
    }

    fn execute(&mut self, statement: &str) -> Result<(), StorageError> {
        self.executed.push(statement.to_string());
        let trimmed = statement.trim_start();
        if let Some((_, message)) = self
            .statement_errors
            .iter()
            .find(|(prefix, _)| trimmed.starts_with(prefix.as_str()))
        {
            return Err(StorageError::Statement {
                message: message.clone(),
            });
        }
        Ok(())
    }
}

/// Transaction over a staged copy of the store's tables.
struct MemoryTransaction<'a> {
    store: &'a mut InMemoryStore,
    staged: BTreeMap<String, MemTable>,
}

impl MemoryTransaction<'_> {
    fn writable(&mut self, table: &str) -> Result<&mut MemTable, StorageError> {
        if let Some(reason) = self.store.rejected.get(table) {
            return Err(StorageError::Rejected {
                table: table.to_string(),
                reason: reason.clone(),
            });
        }
        self.staged
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn insert_row(&mut self, table: &str, fields: &FieldMap) -> Result<i64, StorageError> {
        Ok(self.writable(table)?.insert(fields))
    }

    fn update_row(&mut self, table: &str, id: i64, fields: &FieldMap) -> Result<(), StorageError> {
        let t = self.writable(table)?;
        let row = t.rows.get_mut(&id).ok_or_else(|| StorageError::RowNotFound {
            table: table.to_string(),
            id,
        })?;
        for (k, v) in writable_columns(fields) {
            row.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn delete_row(&mut self, table: &str, id: i64) -> Result<(), StorageError> {
        self.writable(table)?.rows.remove(&id);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTransaction { store, staged } = *self;
        store.tables = staged;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwork_core::{EntitySchema, FieldDef, FieldKind, Persistable, SchemaEntity};
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    fn store_with_waves() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.create_table("simulation_wave");
        store.seed("simulation_wave", fields(json!({"simulationid": 1, "name": "b"}))).unwrap();
        store.seed("simulation_wave", fields(json!({"simulationid": 1, "name": "a"}))).unwrap();
        store.seed("simulation_wave", fields(json!({"simulationid": 2, "name": "c"}))).unwrap();
        store
    }

    #[test]
    fn test_seed_assigns_sequential_ids() {
        let store = store_with_waves();
        let ids: Vec<Value> = store
            .rows("simulation_wave")
            .iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_fetch_rows_filters_and_orders() {
        let store = store_with_waves();
        let rows = store
            .fetch_rows("simulation_wave", &Filter::eq("simulationid", 1), Some("name"))
            .unwrap();
        let names: Vec<&Value> = rows.iter().map(|r| &r["name"]).collect();
        assert_eq!(names, vec![&json!("a"), &json!("b")]);
    }

    #[test]
    fn test_fetch_rows_unknown_table() {
        let store = InMemoryStore::new();
        let err = store.fetch_rows("nope", &Filter::all(), None).unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound { .. }));
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn test_commit_applies_writes() {
        let mut store = store_with_waves();
        {
            let mut tx = store.begin().unwrap();
            let id = tx.insert_row("simulation_wave", &fields(json!({"id": 99, "name": "d"}))).unwrap();
            assert_eq!(id, 4);
            tx.update_row("simulation_wave", 1, &fields(json!({"name": "z"}))).unwrap();
            tx.delete_row("simulation_wave", 2).unwrap();
            tx.commit().unwrap();
        }
        let rows = store.rows("simulation_wave");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["name"], json!("z"));
        assert_eq!(rows[2]["id"], json!(4));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut store = store_with_waves();
        {
            let mut tx = store.begin().unwrap();
            tx.delete_row("simulation_wave", 1).unwrap();
            tx.insert_row("simulation_wave", &fields(json!({"name": "d"}))).unwrap();
            tx.rollback().unwrap();
        }
        assert_eq!(store.row_count("simulation_wave"), 3);
    }

    #[test]
    fn test_update_missing_row_fails() {
        let mut store = store_with_waves();
        let mut tx = store.begin().unwrap();
        let err = tx
            .update_row("simulation_wave", 42, &fields(json!({"name": "x"})))
            .unwrap_err();
        assert!(matches!(err, StorageError::RowNotFound { id: 42, .. }));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut store = store_with_waves();
        let mut tx = store.begin().unwrap();
        tx.delete_row("simulation_wave", 1).unwrap();
        tx.delete_row("simulation_wave", 1).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.row_count("simulation_wave"), 2);
    }

    #[test]
    fn test_rejected_table() {
        let mut store = store_with_waves();
        store.reject_writes_to("simulation_wave", "read only");
        let mut tx = store.begin().unwrap();
        let err = tx.delete_row("simulation_wave", 1).unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
    }

    #[test]
    fn test_entity_level_create_assigns_id() {
        let mut store = InMemoryStore::new();
        store.create_table("simulation_wave");
        let schema = Arc::new(
            EntitySchema::new("simulation_wave").field(FieldDef::new("name", FieldKind::Text)),
        );
        let mut wave = SchemaEntity::new(schema, fields(json!({"name": "w"}))).unwrap();
        {
            let mut tx = store.begin().unwrap();
            let id = tx.create(&mut wave).unwrap();
            tx.commit().unwrap();
            assert_eq!(id, 1);
        }
        assert_eq!(wave.id(), Some(1));
        let mut tx = store.begin().unwrap();
        wave.set("name", json!("renamed")).unwrap();
        tx.update(&wave).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.rows("simulation_wave")[0]["name"], json!("renamed"));
    }

    #[test]
    fn test_entity_level_update_requires_id() {
        let mut store = InMemoryStore::new();
        store.create_table("simulation_wave");
        let schema = Arc::new(EntitySchema::new("simulation_wave"));
        let wave = SchemaEntity::new(schema, FieldMap::new()).unwrap();
        let mut tx = store.begin().unwrap();
        let err = tx.update(&wave).unwrap_err();
        assert!(matches!(err, StorageError::NotPersisted { .. }));
    }

    #[test]
    fn test_execute_records_and_scripts_failures() {
        let mut store = InMemoryStore::new();
        store.fail_statements_starting_with("ALTER TABLE", "constraint already exists");
        store.execute("DELETE FROM t").unwrap();
        let err = store.execute("ALTER TABLE t ADD CONSTRAINT c").unwrap_err();
        assert_eq!(err.to_string(), "constraint already exists");
        assert_eq!(store.executed().len(), 2);
    }

    #[test]
    fn test_list_indexes() {
        let mut store = InMemoryStore::new();
        store.create_table("simulation_circuit");
        store
            .add_index("simulation_circuit", "ix_circuit_wave", &["waveid"])
            .unwrap();
        let idx = store.list_indexes("simulation_circuit").unwrap();
        assert_eq!(idx.len(), 1);
        assert!(idx[0].covers("waveid"));
        assert!(store.list_indexes("missing").is_err());
    }
}
