//! Storage error types for batchwork-storage.
//!
//! [`StorageError`] covers backend failures (SQLite, migrations), lookups of
//! tables and rows that do not exist, entity-level failures surfaced while
//! writing, and the scripted failures of the in-memory backend.

use thiserror::Error;

use batchwork_core::CoreError;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The entity failed validation or field coercion.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The named table does not exist.
    #[error("no such table: {table}")]
    TableNotFound { table: String },

    /// No row with the given id exists in the table.
    #[error("row not found: table={table}, id={id}")]
    RowNotFound { table: String, id: i64 },

    /// An update or delete was requested for an entity without an id.
    #[error("entity in table '{table}' has not been persisted")]
    NotPersisted { table: String },

    /// The backend refused a write.
    #[error("write to '{table}' rejected: {reason}")]
    Rejected { table: String, reason: String },

    /// A raw statement failed.
    #[error("{message}")]
    Statement { message: String },
}
