//! Reads the configured root scope from the store into a fresh [`Registry`].
//!
//! Root types are fetched by their column referencing the scope row, then each
//! child type is fetched once per registered instance of its parent type.
//! Because the classmap is dependency ordered, a parent's instances are always
//! registered before its children are looked up.

use indexmap::IndexMap;
use serde_json::Value;

use batchwork_core::descriptor::join_column_for;
use batchwork_core::schema::ID_FIELD;
use batchwork_core::{Classmap, EntityDescriptor, EntityKey, Persistable, Row};
use batchwork_storage::{Filter, Store};

use crate::config::UowConfig;
use crate::error::UowError;
use crate::registry::{RegisteredEntity, Registry};

/// Rows loaded per repository by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: IndexMap<String, usize>,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.loaded.values().sum()
    }
}

/// Result of a successful load.
#[derive(Debug, Default)]
pub(crate) struct LoadedScope {
    pub main_rows: Vec<Row>,
    pub registry: Registry,
    pub summary: LoadSummary,
}

/// Fetches the main table rows for the configured scope.
///
/// With and without a child-parent column override the scope row is looked
/// up by id.
pub(crate) fn main_table_settings(store: &dyn Store, config: &UowConfig) -> Result<Vec<Row>, UowError> {
    if !config.has_scope() {
        return Err(UowError::ScopeNotConfigured {
            table: config.main_table_name.clone(),
            key: config.main_table_key,
        });
    }
    let filter = Filter::eq(ID_FIELD, config.main_table_key);
    let rows = store.fetch_rows(&config.main_table_name, &filter, None)?;
    if rows.is_empty() {
        return Err(UowError::ScopeNotFound {
            table: config.main_table_name.clone(),
            key: config.main_table_key,
        });
    }
    Ok(rows)
}

/// Column of a root type's table that references the scope row.
pub(crate) fn root_join_column(descriptor: &EntityDescriptor, config: &UowConfig) -> String {
    match config.child_parent_id_column() {
        None if descriptor.table() == config.main_table_name => ID_FIELD.to_string(),
        Some(column) => column.to_string(),
        None => format!("{}id", config.main_table_name),
    }
}

/// Value matched against [`root_join_column`]: the first main row's value in
/// that column when present and non-null, else the scope key.
pub(crate) fn root_join_value(column: &str, main_rows: &[Row], config: &UowConfig) -> Value {
    main_rows
        .first()
        .and_then(|row| row.get(column))
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(config.main_table_key))
}

/// Loads everything belonging to the configured scope.
pub(crate) fn load_scope(
    store: &dyn Store,
    classmap: &Classmap,
    config: &UowConfig,
) -> Result<LoadedScope, UowError> {
    let main_rows = main_table_settings(store, config)?;
    let mut registry = Registry::new();
    let mut summary = LoadSummary::default();

    for descriptor in classmap.iter() {
        let count = match classmap.parent_of(descriptor) {
            None => {
                let column = root_join_column(descriptor, config);
                let value = root_join_value(&column, &main_rows, config);
                let filter = Filter::eq(column, value);
                register_rows(store, descriptor, &filter, &mut registry)?
            }
            Some(parent) => {
                let column = join_column_for(parent.repository());
                let mut count = 0;
                for parent_id in registry.persisted_ids(parent.repository()) {
                    let filter = Filter::eq(column.as_str(), parent_id);
                    count += register_rows(store, descriptor, &filter, &mut registry)?;
                }
                count
            }
        };
        tracing::debug!(repository = descriptor.repository(), rows = count, "loaded repository");
        summary
            .loaded
            .insert(descriptor.repository().to_string(), count);
    }

    Ok(LoadedScope {
        main_rows,
        registry,
        summary,
    })
}

/// Fetches the rows of `descriptor`'s table matching `filter`, ordered by id,
/// and registers each as a hashed entity.
fn register_rows(
    store: &dyn Store,
    descriptor: &EntityDescriptor,
    filter: &Filter,
    registry: &mut Registry,
) -> Result<usize, UowError> {
    let rows = store.fetch_rows(descriptor.table(), filter, Some(ID_FIELD))?;
    let mut count = 0;
    for row in rows {
        let object = descriptor.factory().hydrate(row)?;
        let Some(id) = object.id() else {
            tracing::warn!(table = descriptor.table(), "skipping row without id");
            continue;
        };
        let key = EntityKey::persisted(descriptor.short_name(), id);
        registry.insert(descriptor.repository(), key, RegisteredEntity::loaded(object));
        count += 1;
    }
    Ok(count)
}
