//! Storage abstraction for the batchwork unit of work.
//!
//! Provides the [`Store`] and [`Transaction`] traits that every backend
//! implements, plus [`InMemoryStore`] and [`SqliteStore`] as first-class
//! backends.
//!
//! # Architecture
//!
//! The storage layer has a two-layer API:
//! - **Row-level** methods (`fetch_rows`, `insert_row`, `update_row`,
//!   `delete_row`) move plain `FieldMap`s in and out of named tables.
//! - **Entity-level** methods (`create`, `update`, `delete`) work on
//!   [`batchwork_core::Persistable`] values and delegate to the row methods.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: Filter and IndexInfo storage-layer types
//! - [`traits`]: Store and Transaction trait definitions
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: connection pragmas and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, Transaction};
pub use types::{Filter, IndexInfo};
