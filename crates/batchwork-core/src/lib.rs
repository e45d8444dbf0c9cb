//! Core data model for the batchwork unit-of-work engine.
//!
//! Everything in this crate is store-agnostic: entity identity, field values,
//! schema-driven entities, entity descriptors and the dependency ordering of
//! descriptors. Persistence lives in `batchwork-storage`; the unit of work
//! itself lives in `batchwork-uow`.
//!
//! # Modules
//!
//! - [`error`]: CoreError enum with all failure modes
//! - [`id`]: EntityKey and EntityUuid identity types
//! - [`value`]: FieldMap / Row aliases and loose value helpers
//! - [`schema`]: EntitySchema field definitions with type coercion
//! - [`entity`]: the Persistable and EntityFactory traits, SchemaEntity
//! - [`descriptor`]: EntityDescriptor (one classmap entry)
//! - [`order`]: Classmap, the dependency-ordered set of descriptors

pub mod descriptor;
pub mod entity;
pub mod error;
pub mod id;
pub mod order;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use descriptor::EntityDescriptor;
pub use entity::{EntityFactory, Persistable, SchemaEntity, SchemaFactory};
pub use error::CoreError;
pub use id::{EntityKey, EntityUuid, KeySlot};
pub use order::Classmap;
pub use schema::{EntitySchema, FieldDef, FieldDefault, FieldKind};
pub use value::{FieldMap, Row};
