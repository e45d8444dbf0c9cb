//! `ON DELETE CASCADE` constraints between parent and child tables.
//!
//! Every parent/child pair of the classmap yields a [`CascadeLink`]: the child
//! table's `<parent short name>id` column referencing the parent table's id.
//! When an index on the child table already covers that column the link is
//! left alone. Otherwise [`ensure`] removes orphaned child rows and adds the
//! constraint, and [`remove`] drops it again.
//!
//! Statements are plain SQL sent through [`Store::execute`]. Failures are
//! classified by the store's message, reported to the notification sink and
//! returned; nothing is retried.

use batchwork_core::Classmap;
use batchwork_storage::{StorageError, Store};

use crate::notify::NotificationSink;

/// A child table column referencing a parent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeLink {
    pub parent_table: String,
    pub child_table: String,
    pub field: String,
}

impl CascadeLink {
    pub fn constraint_name(&self) -> String {
        format!("c_{}_{}_id", self.child_table, self.parent_table)
    }

    fn delete_orphans_sql(&self) -> String {
        format!(
            "DELETE FROM {child} WHERE NOT EXISTS (SELECT 1 FROM {parent} WHERE {child}.{field} = {parent}.id)",
            child = self.child_table,
            parent = self.parent_table,
            field = self.field,
        )
    }

    fn add_constraint_sql(&self) -> String {
        format!(
            "ALTER TABLE {child} ADD CONSTRAINT {name} FOREIGN KEY ({field}) REFERENCES {parent}(id) ON DELETE CASCADE",
            child = self.child_table,
            name = self.constraint_name(),
            field = self.field,
            parent = self.parent_table,
        )
    }

    fn drop_constraint_sql(&self) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.child_table,
            self.constraint_name()
        )
    }
}

/// Kinds of store failures, told apart by message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeFailure {
    /// The parent id and the child column have incompatible types.
    TypeMismatch,
    /// The child or parent table does not exist.
    MissingTable,
    Other,
}

/// Result of handling one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// An index already covers the column; nothing was executed.
    Indexed,
    /// The statements ran, or the constraint already existed.
    Applied,
    Failed { kind: CascadeFailure, message: String },
}

impl CascadeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CascadeOutcome::Failed { .. })
    }
}

/// Parent/child pairs of `classmap`, parents first.
pub fn links(classmap: &Classmap) -> Vec<CascadeLink> {
    classmap
        .iter()
        .flat_map(|parent| {
            classmap
                .children_of(parent.type_id())
                .into_iter()
                .map(move |child| CascadeLink {
                    parent_table: parent.table().to_string(),
                    child_table: child.table().to_string(),
                    field: parent.foreign_key_field(),
                })
        })
        .collect()
}

/// Adds the cascade constraint of every link not covered by an index.
pub fn ensure(
    store: &mut dyn Store,
    classmap: &Classmap,
    sink: &dyn NotificationSink,
) -> Vec<(CascadeLink, CascadeOutcome)> {
    links(classmap)
        .into_iter()
        .map(|link| {
            let outcome = ensure_link(store, &link, sink);
            (link, outcome)
        })
        .collect()
}

/// Drops the cascade constraint of every link not covered by an index.
pub fn remove(
    store: &mut dyn Store,
    classmap: &Classmap,
    sink: &dyn NotificationSink,
) -> Vec<(CascadeLink, CascadeOutcome)> {
    links(classmap)
        .into_iter()
        .map(|link| {
            let outcome = remove_link(store, &link, sink);
            (link, outcome)
        })
        .collect()
}

pub fn ensure_link(store: &mut dyn Store, link: &CascadeLink, sink: &dyn NotificationSink) -> CascadeOutcome {
    match is_indexed(store, link) {
        Ok(true) => return CascadeOutcome::Indexed,
        Ok(false) => {}
        Err(err) => return failed(link, &err, sink),
    }
    let result = store
        .execute(&link.delete_orphans_sql())
        .and_then(|()| store.execute(&link.add_constraint_sql()));
    match result {
        Ok(()) => {
            tracing::info!(constraint = %link.constraint_name(), "added cascade constraint");
            CascadeOutcome::Applied
        }
        Err(err) if err.to_string().ends_with("already exists") => CascadeOutcome::Applied,
        Err(err) => failed(link, &err, sink),
    }
}

pub fn remove_link(store: &mut dyn Store, link: &CascadeLink, sink: &dyn NotificationSink) -> CascadeOutcome {
    match is_indexed(store, link) {
        Ok(true) => return CascadeOutcome::Indexed,
        Ok(false) => {}
        Err(err) => return failed(link, &err, sink),
    }
    match store.execute(&link.drop_constraint_sql()) {
        Ok(()) => {
            tracing::info!(constraint = %link.constraint_name(), "dropped cascade constraint");
            CascadeOutcome::Applied
        }
        Err(err) => failed(link, &err, sink),
    }
}

fn is_indexed(store: &dyn Store, link: &CascadeLink) -> Result<bool, StorageError> {
    let indexes = store.list_indexes(&link.child_table)?;
    Ok(indexes.iter().any(|index| index.covers(&link.field)))
}

/// Classifies a store error message.
pub fn classify(message: &str) -> CascadeFailure {
    let lower = message.to_lowercase();
    if lower.contains("operator does not exist") {
        CascadeFailure::TypeMismatch
    } else if lower.contains("no such table")
        || (lower.contains("relation") && lower.contains("does not exist"))
    {
        CascadeFailure::MissingTable
    } else {
        CascadeFailure::Other
    }
}

fn failed(link: &CascadeLink, err: &StorageError, sink: &dyn NotificationSink) -> CascadeOutcome {
    let message = err.to_string();
    let kind = classify(&message);
    let notice = match kind {
        CascadeFailure::TypeMismatch => format!(
            "id field of {} and {} of {} have different data types",
            link.parent_table, link.field, link.child_table
        ),
        CascadeFailure::MissingTable => format!(
            "{} table missing, perhaps there is an upgrade to be done",
            link.child_table
        ),
        CascadeFailure::Other => format!("failed ({message})"),
    };
    sink.notify(&notice);
    CascadeOutcome::Failed { kind, message }
}
