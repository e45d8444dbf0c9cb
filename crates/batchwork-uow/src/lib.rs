//! The batchwork unit of work.
//!
//! A [`UnitOfWork`] loads every entity of a root scope from a
//! [`batchwork_storage::Store`], accepts a batch of [`ChangeRecord`]s that
//! describes the complete desired state of that scope, and writes the
//! difference back in one transaction: creates parents first, updates in the
//! same order, deletes children first.
//!
//! # Modules
//!
//! - [`error`]: UowError enum with all failure modes
//! - [`config`]: UowConfig, the root scope and options
//! - [`notify`]: NotificationSink and the tracing/collecting sinks
//! - [`hash`]: blake3 content hashes of entity snapshots
//! - [`registry`]: Registry and RegisteredEntity
//! - [`dirty`]: DirtySet, the pending create/update/delete lists
//! - [`loader`]: reads the root scope into a registry
//! - [`tracker`]: ChangeRecord and the `save` logic
//! - [`commit`]: the create, update and delete phases
//! - [`export`]: ExportRecord snapshots
//! - [`cascade`]: `ON DELETE CASCADE` constraint maintenance
//! - [`unit_of_work`]: the UnitOfWork itself

pub mod cascade;
pub mod commit;
pub mod config;
pub mod dirty;
pub mod error;
pub mod export;
pub mod hash;
pub mod loader;
pub mod notify;
pub mod registry;
pub mod tracker;
pub mod unit_of_work;

// Re-export key types for ergonomic use.
pub use cascade::{CascadeFailure, CascadeLink, CascadeOutcome};
pub use commit::{CommitSummary, Stage, StageAction, StageEntry};
pub use config::UowConfig;
pub use dirty::{DirtyList, DirtySet};
pub use error::UowError;
pub use export::ExportRecord;
pub use hash::{hash_snapshot, ContentHash};
pub use loader::LoadSummary;
pub use notify::{CollectingSink, NotificationSink, TracingSink};
pub use registry::{RegisteredEntity, Registry};
pub use tracker::{ChangeRecord, CreateRecord, SaveSummary, UpdateRecord};
pub use unit_of_work::UnitOfWork;
