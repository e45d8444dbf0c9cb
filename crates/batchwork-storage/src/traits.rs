//! The [`Store`] and [`Transaction`] traits defining the storage contract.
//!
//! Two-layer API design:
//! - **Low-level row** methods (`insert_row`, `update_row`, `delete_row`) form
//!   the foundation. Each call writes exactly one row.
//! - **Entity-level** methods (`create`, `update`, `delete`) take a
//!   [`Persistable`], validate it and delegate to the row methods.
//!
//! Reads go through the [`Store`] directly; every write goes through a
//! [`Transaction`] obtained from [`Store::begin`]. Dropping a transaction
//! without committing it discards its writes.

use batchwork_core::schema::ID_FIELD;
use batchwork_core::{FieldMap, Persistable, Row};

use crate::error::StorageError;
use crate::types::{Filter, IndexInfo};

/// The storage contract consumed by the unit of work.
///
/// The trait is synchronous: every call is a blocking round trip.
pub trait Store {
    /// Fetches all rows of `table` matching `filter`, optionally ordered by a column.
    fn fetch_rows(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>, StorageError>;

    /// Opens a transaction.
    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StorageError>;

    /// Lists the indexes defined on `table`.
    fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>, StorageError>;

    /// Executes a raw statement outside any transaction.
    fn execute(&mut self, statement: &str) -> Result<(), StorageError>;
}

/// An open store transaction.
pub trait Transaction {
    // -------------------------------------------------------------------
    // Row-level operations
    // -------------------------------------------------------------------

    /// Inserts a row and returns its new id. Any `id` in `fields` is ignored.
    fn insert_row(&mut self, table: &str, fields: &FieldMap) -> Result<i64, StorageError>;

    /// Overwrites the given fields of row `id`. Fails if the row does not exist.
    fn update_row(&mut self, table: &str, id: i64, fields: &FieldMap) -> Result<(), StorageError>;

    /// Deletes row `id`. Deleting a row that is already gone is not an error.
    fn delete_row(&mut self, table: &str, id: i64) -> Result<(), StorageError>;

    /// Makes all writes of this transaction durable.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discards all writes of this transaction.
    fn rollback(self: Box<Self>) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Entity-level operations
    // -------------------------------------------------------------------

    /// Validates and inserts `entity`, then records the assigned id on it.
    fn create(&mut self, entity: &mut dyn Persistable) -> Result<i64, StorageError> {
        entity.validate()?;
        let id = self.insert_row(entity.table(), &entity.snapshot())?;
        entity.assign_id(id);
        Ok(id)
    }

    /// Validates `entity` and writes its current fields.
    fn update(&mut self, entity: &dyn Persistable) -> Result<(), StorageError> {
        let id = entity.id().ok_or_else(|| StorageError::NotPersisted {
            table: entity.table().to_string(),
        })?;
        entity.validate()?;
        self.update_row(entity.table(), id, &entity.snapshot())
    }

    /// Deletes the row backing `entity`.
    fn delete(&mut self, entity: &dyn Persistable) -> Result<(), StorageError> {
        let id = entity.id().ok_or_else(|| StorageError::NotPersisted {
            table: entity.table().to_string(),
        })?;
        self.delete_row(entity.table(), id)
    }
}

/// The fields of `fields` that are written as columns (everything but `id`).
pub(crate) fn writable_columns(fields: &FieldMap) -> impl Iterator<Item = (&String, &serde_json::Value)> {
    fields.iter().filter(|(name, _)| name.as_str() != ID_FIELD)
}
