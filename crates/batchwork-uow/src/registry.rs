//! The entity registry: every entity a unit of work knows about.
//!
//! Entities are grouped by repository and keyed by [`EntityKey`]. Entities
//! created through `save` are also indexed by their entity uuid so a child
//! can find its not-yet-persisted parent during commit without scanning.

use std::collections::HashMap;

use indexmap::IndexMap;

use batchwork_core::{EntityKey, EntityUuid, Persistable};

use crate::hash::{hash_snapshot, ContentHash};

/// One tracked entity and its bookkeeping.
#[derive(Debug)]
pub struct RegisteredEntity {
    pub(crate) object: Box<dyn Persistable>,
    pub(crate) content_hash: Option<ContentHash>,
    /// Hash of the values last read from or written to the store.
    stored_hash: Option<ContentHash>,
    pub(crate) entity_uuid: Option<EntityUuid>,
    pub(crate) parent_uuid: Option<EntityUuid>,
}

impl RegisteredEntity {
    /// An entity read from the store, hashed as loaded.
    pub fn loaded(object: Box<dyn Persistable>) -> Self {
        let content_hash = Some(hash_snapshot(&object.snapshot()));
        RegisteredEntity {
            object,
            content_hash,
            stored_hash: content_hash,
            entity_uuid: None,
            parent_uuid: None,
        }
    }

    /// An entity submitted for creation.
    pub fn created(
        object: Box<dyn Persistable>,
        entity_uuid: EntityUuid,
        parent_uuid: Option<EntityUuid>,
    ) -> Self {
        RegisteredEntity {
            object,
            content_hash: None,
            stored_hash: None,
            entity_uuid: Some(entity_uuid),
            parent_uuid,
        }
    }

    pub fn object(&self) -> &dyn Persistable {
        self.object.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.object.id()
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    pub fn entity_uuid(&self) -> Option<&EntityUuid> {
        self.entity_uuid.as_ref()
    }

    pub fn parent_uuid(&self) -> Option<&EntityUuid> {
        self.parent_uuid.as_ref()
    }

    /// Persisted but no longer hashed.
    pub fn is_delete_candidate(&self) -> bool {
        self.id().is_some() && self.content_hash.is_none()
    }

    /// Neither persisted nor hashed.
    pub fn is_create_candidate(&self) -> bool {
        self.id().is_none() && self.content_hash.is_none()
    }

    /// Whether the current field values differ from the stored hash.
    /// Entities without a stored hash count as unchanged.
    pub fn has_changed(&self) -> bool {
        self.content_hash
            .is_some_and(|stored| stored != hash_snapshot(&self.object.snapshot()))
    }

    pub(crate) fn rehash(&mut self) {
        self.reset_hash(Some(hash_snapshot(&self.object.snapshot())));
    }

    /// Sets both the working and the stored hash.
    pub(crate) fn reset_hash(&mut self, hash: Option<ContentHash>) {
        self.content_hash = hash;
        self.stored_hash = hash;
    }
}

/// Entities per repository.
#[derive(Debug, Default)]
pub struct Registry {
    repositories: IndexMap<String, IndexMap<EntityKey, RegisteredEntity>>,
    by_uuid: HashMap<EntityUuid, (String, EntityKey)>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers `entity`, replacing any entity already under `key`.
    pub fn insert(&mut self, repository: &str, key: EntityKey, entity: RegisteredEntity) {
        if let Some(uuid) = &entity.entity_uuid {
            self.by_uuid
                .insert(uuid.clone(), (repository.to_string(), key.clone()));
        }
        self.repositories
            .entry(repository.to_string())
            .or_default()
            .insert(key, entity);
    }

    pub fn get(&self, repository: &str, key: &EntityKey) -> Option<&RegisteredEntity> {
        self.repositories.get(repository)?.get(key)
    }

    pub(crate) fn get_mut(&mut self, repository: &str, key: &EntityKey) -> Option<&mut RegisteredEntity> {
        self.repositories.get_mut(repository)?.get_mut(key)
    }

    pub(crate) fn remove(&mut self, repository: &str, key: &EntityKey) -> Option<RegisteredEntity> {
        let removed = self.repositories.get_mut(repository)?.shift_remove(key)?;
        if let Some(uuid) = &removed.entity_uuid {
            self.by_uuid.remove(uuid);
        }
        Some(removed)
    }

    /// Drops every entity that has not been persisted. Returns how many.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        for entities in self.repositories.values_mut() {
            let before = entities.len();
            entities.retain(|_, e| e.id().is_some());
            discarded += before - entities.len();
        }
        let repositories = &self.repositories;
        self.by_uuid.retain(|_, (repository, key)| {
            repositories
                .get(repository.as_str())
                .is_some_and(|entities| entities.contains_key(&*key))
        });
        discarded
    }

    /// Gives every persisted entity back the hash it was stored with, undoing
    /// the delete marks of an earlier `save`. Returns how many were unmarked.
    pub(crate) fn restore_hashes(&mut self) -> usize {
        let mut restored = 0;
        for entity in self.repositories.values_mut().flat_map(IndexMap::values_mut) {
            if entity.id().is_some() && entity.content_hash != entity.stored_hash {
                entity.content_hash = entity.stored_hash;
                restored += 1;
            }
        }
        restored
    }

    /// Entities of `repository` in registration order.
    pub fn entities(&self, repository: &str) -> impl Iterator<Item = (&EntityKey, &RegisteredEntity)> {
        self.repositories
            .get(repository)
            .into_iter()
            .flat_map(|entities| entities.iter())
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&String, &mut IndexMap<EntityKey, RegisteredEntity>)> {
        self.repositories.iter_mut()
    }

    /// Persisted ids of `repository`'s entities.
    pub fn persisted_ids(&self, repository: &str) -> Vec<i64> {
        self.entities(repository).filter_map(|(_, e)| e.id()).collect()
    }

    pub fn count(&self, repository: &str) -> usize {
        self.repositories.get(repository).map_or(0, IndexMap::len)
    }

    pub fn len(&self) -> usize {
        self.repositories.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_uuid(&self, uuid: &EntityUuid) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    /// Repository and key of the entity created with `uuid`.
    pub fn locate_uuid(&self, uuid: &EntityUuid) -> Option<(&str, &EntityKey)> {
        self.by_uuid
            .get(uuid)
            .map(|(repository, key)| (repository.as_str(), key))
    }

    pub fn find_by_uuid(&self, uuid: &EntityUuid) -> Option<&RegisteredEntity> {
        let (repository, key) = self.locate_uuid(uuid)?;
        self.get(repository, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwork_core::{EntityFactory, EntitySchema, FieldDef, FieldKind, FieldMap, SchemaFactory};
    use serde_json::json;

    fn factory() -> SchemaFactory {
        SchemaFactory::new(
            EntitySchema::new("simulation_wave").field(FieldDef::new("name", FieldKind::Text)),
        )
    }

    fn loaded(id: i64, name: &str) -> RegisteredEntity {
        let row: FieldMap = serde_json::from_value(json!({"id": id, "name": name})).unwrap();
        RegisteredEntity::loaded(factory().hydrate(row).unwrap())
    }

    fn created(name: &str, uuid: &str) -> RegisteredEntity {
        let data: FieldMap = serde_json::from_value(json!({"name": name})).unwrap();
        RegisteredEntity::created(factory().instantiate(data).unwrap(), uuid.into(), None)
    }

    #[test]
    fn test_loaded_entity_is_hashed_and_unchanged() {
        let mut entity = loaded(1, "w");
        assert!(entity.content_hash().is_some());
        assert!(!entity.has_changed());
        assert!(!entity.is_delete_candidate());
        entity.object.set("name", json!("w2")).unwrap();
        assert!(entity.has_changed());
        entity.rehash();
        assert!(!entity.has_changed());
        entity.content_hash = None;
        assert!(entity.is_delete_candidate());
    }

    #[test]
    fn test_created_entity_is_create_candidate() {
        let entity = created("w", "uuid-1");
        assert!(entity.is_create_candidate());
        assert!(!entity.has_changed());
        assert_eq!(entity.entity_uuid().unwrap().as_str(), "uuid-1");
    }

    #[test]
    fn test_uuid_index_follows_insert_and_remove() {
        let mut registry = Registry::new();
        let key = EntityKey::pending("wave", 1);
        registry.insert("simulation_wave", key.clone(), created("w", "uuid-1"));
        registry.insert("simulation_wave", EntityKey::persisted("wave", 5), loaded(5, "x"));
        assert_eq!(registry.len(), 2);
        let uuid = EntityUuid::from("uuid-1");
        assert_eq!(registry.locate_uuid(&uuid), Some(("simulation_wave", &key)));
        assert!(registry.find_by_uuid(&uuid).is_some());

        registry.remove("simulation_wave", &key).unwrap();
        assert!(!registry.contains_uuid(&uuid));
        assert_eq!(registry.persisted_ids("simulation_wave"), vec![5]);
        assert_eq!(registry.count("simulation_circuit"), 0);
    }

    #[test]
    fn test_discard_pending_keeps_persisted() {
        let mut registry = Registry::new();
        registry.insert("simulation_wave", EntityKey::pending("wave", 1), created("w", "uuid-1"));
        registry.insert("simulation_wave", EntityKey::persisted("wave", 5), loaded(5, "x"));

        assert_eq!(registry.discard_pending(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains_uuid(&EntityUuid::from("uuid-1")));
        assert_eq!(registry.persisted_ids("simulation_wave"), vec![5]);
    }

    #[test]
    fn test_restore_hashes_unmarks_deletes() {
        let mut registry = Registry::new();
        let key = EntityKey::persisted("wave", 5);
        registry.insert("simulation_wave", key.clone(), loaded(5, "x"));
        let stored = registry.get("simulation_wave", &key).unwrap().content_hash;

        registry.get_mut("simulation_wave", &key).unwrap().content_hash = None;
        assert!(registry.get("simulation_wave", &key).unwrap().is_delete_candidate());

        assert_eq!(registry.restore_hashes(), 1);
        let entity = registry.get("simulation_wave", &key).unwrap();
        assert!(!entity.is_delete_candidate());
        assert_eq!(entity.content_hash, stored);
        assert_eq!(registry.restore_hashes(), 0);
    }

    #[test]
    fn test_rehash_moves_stored_hash() {
        let mut registry = Registry::new();
        let key = EntityKey::persisted("wave", 5);
        registry.insert("simulation_wave", key.clone(), loaded(5, "x"));

        let entity = registry.get_mut("simulation_wave", &key).unwrap();
        entity.object.set("name", json!("y")).unwrap();
        entity.rehash();
        let written = entity.content_hash;
        entity.content_hash = None;

        registry.restore_hashes();
        let entity = registry.get("simulation_wave", &key).unwrap();
        assert_eq!(entity.content_hash, written);
        assert!(!entity.has_changed());
    }
}
