//! Error types for the unit of work.

use thiserror::Error;

use batchwork_core::CoreError;
use batchwork_storage::StorageError;

/// Errors produced by the unit of work.
#[derive(Debug, Error)]
pub enum UowError {
    /// Classmap validation, field coercion or entity validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store reported an error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The main table name or key is missing.
    #[error("root scope is not configured (main table '{table}', key {key})")]
    ScopeNotConfigured { table: String, key: i64 },

    /// The main table has no row for the configured key.
    #[error("no row with id {key} in main table '{table}'")]
    ScopeNotFound { table: String, key: i64 },

    /// `save` was called on a unit of work without entity types.
    #[error("classmap is empty")]
    EmptyClassmap,

    /// The unit of work has already been committed.
    #[error("unit of work already committed")]
    AlreadyCommitted,

    /// A change record named a repository outside the classmap.
    #[error("unknown repository '{repository}'")]
    UnknownRepository { repository: String },

    /// Two create records carried the same entity uuid.
    #[error("duplicate entity uuid '{uuid}'")]
    DuplicateUuid { uuid: String },

    /// `export_data` was called while dirty or after commit.
    #[error("cannot export a {state} unit of work")]
    NotExportable { state: &'static str },
}

impl UowError {
    /// Whether this is one of the load failures a constructor tolerates.
    pub fn is_scope_error(&self) -> bool {
        matches!(
            self,
            UowError::ScopeNotConfigured { .. } | UowError::ScopeNotFound { .. }
        )
    }
}
