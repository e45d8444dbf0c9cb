//! Pending create, update and delete work, grouped by repository.
//!
//! The lists are seeded in dependency order when the set is built, so
//! iterating `create` or `update` visits parents before children and
//! iterating `delete` visits children first.

use indexmap::IndexMap;
use serde::Serialize;

use batchwork_core::{Classmap, EntityKey};

/// Keys per repository, in processing order.
pub type DirtyList = IndexMap<String, Vec<EntityKey>>;

/// The three dirty lists of a unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirtySet {
    pub(crate) create: DirtyList,
    pub(crate) update: DirtyList,
    pub(crate) delete: DirtyList,
}

impl DirtySet {
    /// Empty lists for every repository of `classmap`.
    pub fn skeleton(classmap: &Classmap) -> Self {
        let forward: DirtyList = classmap
            .iter()
            .map(|d| (d.repository().to_string(), Vec::new()))
            .collect();
        let reverse: DirtyList = classmap
            .delete_order()
            .map(|d| (d.repository().to_string(), Vec::new()))
            .collect();
        DirtySet {
            create: forward.clone(),
            update: forward,
            delete: reverse,
        }
    }

    pub fn create(&self) -> &DirtyList {
        &self.create
    }

    pub fn update(&self) -> &DirtyList {
        &self.update
    }

    pub fn delete(&self) -> &DirtyList {
        &self.delete
    }

    /// True when no list holds a key.
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        [&self.create, &self.update, &self.delete]
            .iter()
            .flat_map(|list| list.values())
            .map(Vec::len)
            .sum()
    }

    pub(crate) fn push_create(&mut self, repository: &str, key: EntityKey) {
        push(&mut self.create, repository, key);
    }

    /// Returns false when the key was already listed.
    pub(crate) fn push_update(&mut self, repository: &str, key: EntityKey) -> bool {
        if listed(&self.update, repository, &key) {
            return false;
        }
        push(&mut self.update, repository, key);
        true
    }

    pub(crate) fn push_delete(&mut self, repository: &str, key: EntityKey) {
        push(&mut self.delete, repository, key);
    }

    /// Whether `key` is in the create or update list of `repository`.
    pub(crate) fn is_referenced(&self, repository: &str, key: &EntityKey) -> bool {
        listed(&self.create, repository, key) || listed(&self.update, repository, key)
    }
}

fn listed(list: &DirtyList, repository: &str, key: &EntityKey) -> bool {
    list.get(repository).is_some_and(|keys| keys.contains(key))
}

fn push(list: &mut DirtyList, repository: &str, key: EntityKey) {
    list.entry(repository.to_string()).or_default().push(key);
}
