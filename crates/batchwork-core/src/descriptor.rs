//! Entity descriptors: one entry of the classmap.
//!
//! A descriptor ties a repository name (the registry grouping, usually the
//! table name) to an entity type identifier, the identifier of its parent
//! type (if any) and the factory that builds its instances.

use std::fmt;
use std::sync::Arc;

use crate::entity::{EntityFactory, SchemaFactory};
use crate::schema::EntitySchema;

/// Static description of one participating entity type.
#[derive(Clone)]
pub struct EntityDescriptor {
    repository: String,
    type_id: String,
    parent_type_id: Option<String>,
    factory: Arc<dyn EntityFactory>,
}

impl EntityDescriptor {
    /// Creates a descriptor. An empty `parent_type_id` is treated as no parent.
    pub fn new(
        repository: impl Into<String>,
        type_id: impl Into<String>,
        parent_type_id: Option<&str>,
        factory: Arc<dyn EntityFactory>,
    ) -> Self {
        EntityDescriptor {
            repository: repository.into(),
            type_id: type_id.into(),
            parent_type_id: parent_type_id
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            factory,
        }
    }

    /// Root-type descriptor backed by a schema.
    pub fn root(
        repository: impl Into<String>,
        type_id: impl Into<String>,
        schema: EntitySchema,
    ) -> Self {
        Self::new(repository, type_id, None, Arc::new(SchemaFactory::new(schema)))
    }

    /// Child-type descriptor backed by a schema.
    pub fn child(
        repository: impl Into<String>,
        type_id: impl Into<String>,
        parent_type_id: &str,
        schema: EntitySchema,
    ) -> Self {
        Self::new(
            repository,
            type_id,
            Some(parent_type_id),
            Arc::new(SchemaFactory::new(schema)),
        )
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn parent_type_id(&self) -> Option<&str> {
        self.parent_type_id.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent_type_id.is_none()
    }

    /// Last path segment of the type identifier (`sim::wave` -> `wave`).
    pub fn short_name(&self) -> &str {
        short_name_of(&self.type_id)
    }

    /// Column in child tables referencing this type (`wave` -> `waveid`).
    pub fn foreign_key_field(&self) -> String {
        format!("{}id", self.short_name())
    }

    pub fn table(&self) -> &str {
        self.factory.table()
    }

    pub fn factory(&self) -> &dyn EntityFactory {
        self.factory.as_ref()
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("repository", &self.repository)
            .field("type_id", &self.type_id)
            .field("parent_type_id", &self.parent_type_id)
            .field("table", &self.factory.table())
            .finish()
    }
}

/// Last `::` or `\` delimited segment of a type identifier.
pub fn short_name_of(type_id: &str) -> &str {
    type_id
        .rsplit(|c| c == ':' || c == '\\')
        .next()
        .unwrap_or(type_id)
}

/// Join column a child table uses to reference rows of `parent_repository`:
/// its last `_` delimited segment plus `id` (`simulation_wave` -> `waveid`).
pub fn join_column_for(parent_repository: &str) -> String {
    let segment = parent_repository
        .rsplit('_')
        .next()
        .unwrap_or(parent_repository);
    format!("{segment}id")
}
