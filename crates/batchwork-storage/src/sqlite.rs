//! SQLite implementation of [`Store`].
//!
//! [`SqliteStore`] maps rows to `FieldMap`s column by column. Identifiers are
//! always double-quoted and every value is bound as a parameter, so table and
//! column names come from entity schemas and values never reach the SQL text.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Number, Value};

use batchwork_core::{FieldMap, Row};

use crate::error::StorageError;
use crate::traits::{writable_columns, Store, Transaction};
use crate::types::{Filter, IndexInfo};

/// SQLite-backed implementation of [`Store`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        Self::with_migrations(Some(path), &[])
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_migrations(None, &[])
    }

    /// Opens a database (in memory when `path` is `None`) and applies the
    /// application's schema migrations.
    pub fn with_migrations(path: Option<&str>, steps: &[&str]) -> Result<Self, StorageError> {
        let conn = match path {
            Some(path) => crate::schema::open_database(path, steps)?,
            None => crate::schema::open_in_memory(steps)?,
        };
        Ok(SqliteStore { conn })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Quotes an identifier for use in SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

impl Store for SqliteStore {
    fn fetch_rows(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>, StorageError> {
        let mut sql = format!("SELECT * FROM {}", quote_ident(table));
        let mut values = Vec::with_capacity(filter.conditions().len());
        let clauses: Vec<String> = filter
            .conditions()
            .iter()
            .enumerate()
            .map(|(i, (column, value))| {
                values.push(to_sql_value(value));
                format!("{} = ?{}", quote_ident(column), i + 1)
            })
            .collect();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(column) = order_by {
            sql.push_str(&format!(" ORDER BY {}", quote_ident(column)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), from_sql_ref(row.get_ref(i)?));
            }
            out.push(map);
        }
        tracing::trace!(table, rows = out.len(), "fetched rows");
        Ok(out)
    }

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StorageError> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>, StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::TableNotFound {
                table: table.to_string(),
            });
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_list({})", quote_ident(table)))?;
        let listed: Vec<(String, bool)> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>("name")?, row.get::<_, i64>("unique")? != 0))
            })?
            .collect::<Result<_, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        for (name, unique) in listed {
            let mut info = self
                .conn
                .prepare(&format!("PRAGMA index_info({})", quote_ident(&name)))?;
            let columns: Vec<Option<String>> = info
                .query_map([], |row| row.get::<_, Option<String>>("name"))?
                .collect::<Result<_, _>>()?;
            indexes.push(IndexInfo {
                name,
                columns: columns.into_iter().flatten().collect(),
                unique,
            });
        }
        Ok(indexes)
    }

    fn execute(&mut self, statement: &str) -> Result<(), StorageError> {
        self.conn.execute_batch(statement)?;
        Ok(())
    }
}

/// An open SQLite transaction. Dropping it without commit rolls back.
pub struct SqliteTransaction<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl Transaction for SqliteTransaction<'_> {
    fn insert_row(&mut self, table: &str, fields: &FieldMap) -> Result<i64, StorageError> {
        let (columns, values): (Vec<String>, Vec<SqlValue>) = writable_columns(fields)
            .map(|(k, v)| (quote_ident(k), to_sql_value(v)))
            .unzip();
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        self.tx.execute(&sql, params_from_iter(values.iter()))?;
        Ok(self.tx.last_insert_rowid())
    }

    fn update_row(&mut self, table: &str, id: i64, fields: &FieldMap) -> Result<(), StorageError> {
        let (assignments, mut values): (Vec<String>, Vec<SqlValue>) = writable_columns(fields)
            .enumerate()
            .map(|(i, (k, v))| (format!("{} = ?{}", quote_ident(k), i + 1), to_sql_value(v)))
            .unzip();
        let affected = if assignments.is_empty() {
            let exists: bool = self.tx.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", quote_ident(table)),
                params![id],
                |row| row.get(0),
            )?;
            usize::from(exists)
        } else {
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}",
                quote_ident(table),
                assignments.join(", "),
                values.len() + 1
            );
            values.push(SqlValue::Integer(id));
            self.tx.execute(&sql, params_from_iter(values.iter()))?
        };
        if affected == 0 {
            return Err(StorageError::RowNotFound {
                table: table.to_string(),
                id,
            });
        }
        Ok(())
    }

    fn delete_row(&mut self, table: &str, id: i64) -> Result<(), StorageError> {
        self.tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", quote_ident(table)),
            params![id],
        )?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let SqliteTransaction { tx } = *self;
        tx.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let SqliteTransaction { tx } = *self;
        tx.rollback()?;
        Ok(())
    }
}
