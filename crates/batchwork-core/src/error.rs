//! Core error types for batchwork-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! classmap construction and entity field handling.

use thiserror::Error;

use crate::schema::FieldKind;

/// Core errors produced by the batchwork-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two descriptors share a repository name.
    #[error("duplicate repository: '{repository}'")]
    DuplicateRepository { repository: String },

    /// Two descriptors share a type identifier.
    #[error("duplicate entity type: '{type_id}'")]
    DuplicateType { type_id: String },

    /// A descriptor names a parent type that is not part of the classmap.
    #[error("repository '{repository}' declares unknown parent type '{parent_type_id}'")]
    UnknownParentType {
        repository: String,
        parent_type_id: String,
    },

    /// The parent declarations form a cycle.
    #[error("dependency cycle involving repository '{repository}'")]
    DependencyCycle { repository: String },

    /// A field is not part of the entity's schema.
    #[error("unknown field '{field}' on table '{table}'")]
    UnknownField { table: String, field: String },

    /// A value could not be coerced into the field's declared kind.
    #[error("field '{table}.{field}' expects {expected}, got {found}")]
    TypeMismatch {
        table: String,
        field: String,
        expected: FieldKind,
        found: String,
    },

    /// Null was assigned to a field that does not allow it.
    #[error("field '{table}.{field}' does not allow null")]
    NullNotAllowed { table: String, field: String },

    /// A required field has no value at validation time.
    #[error("required field '{table}.{field}' is missing")]
    MissingField { table: String, field: String },
}
