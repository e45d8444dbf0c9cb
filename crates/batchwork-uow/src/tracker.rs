//! Change records and their application to the registry.
//!
//! `save` receives an ordered list of [`ChangeRecord`]s. Updates are applied
//! to already registered entities, creates register new instances under a
//! pending key, and every registered entity that no record references is then
//! scheduled for deletion.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use batchwork_core::schema::ID_FIELD;
use batchwork_core::value::as_i64;
use batchwork_core::{Classmap, EntityKey, EntityUuid, FieldMap};

use crate::dirty::DirtySet;
use crate::error::UowError;
use crate::registry::{RegisteredEntity, Registry};

/// Changes to an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    #[serde(rename = "entityId", deserialize_with = "entity_id_from_json")]
    pub entity_id: i64,
    #[serde(rename = "repositoryName")]
    pub repository_name: String,
    #[serde(default)]
    pub data: FieldMap,
}

/// A new entity, optionally linked to a new parent of the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRecord {
    #[serde(rename = "repositoryName")]
    pub repository_name: String,
    #[serde(rename = "entityUUID")]
    pub entity_uuid: EntityUuid,
    #[serde(rename = "parentUUID", default)]
    pub parent_uuid: Option<EntityUuid>,
    #[serde(default)]
    pub data: FieldMap,
}

/// One element of a `save` batch.
///
/// The JSON shape decides the kind: records with an `entityId` are updates,
/// records with an `entityUUID` are creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeRecord {
    Update(UpdateRecord),
    Create(CreateRecord),
}

impl ChangeRecord {
    pub fn update(entity_id: i64, repository_name: impl Into<String>, data: FieldMap) -> Self {
        ChangeRecord::Update(UpdateRecord {
            entity_id,
            repository_name: repository_name.into(),
            data,
        })
    }

    pub fn create(
        repository_name: impl Into<String>,
        entity_uuid: impl Into<EntityUuid>,
        parent_uuid: Option<EntityUuid>,
        data: FieldMap,
    ) -> Self {
        ChangeRecord::Create(CreateRecord {
            repository_name: repository_name.into(),
            entity_uuid: entity_uuid.into(),
            parent_uuid,
            data,
        })
    }

    pub fn repository_name(&self) -> &str {
        match self {
            ChangeRecord::Update(r) => &r.repository_name,
            ChangeRecord::Create(r) => &r.repository_name,
        }
    }
}

/// Accepts ids sent as numbers or numeric strings.
fn entity_id_from_json<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_i64(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid entityId {value}")))
}

/// Outcome counts of one `save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub created: usize,
    pub updated: usize,
    /// Update records naming an entity that is not registered.
    pub skipped: usize,
    /// Entities scheduled for deletion by omission.
    pub deleted: usize,
}

/// Mutable state `save` works on.
pub(crate) struct Tracker<'a> {
    pub classmap: &'a Classmap,
    pub registry: &'a mut Registry,
    pub dirty: &'a mut DirtySet,
    pub next_pending: &'a mut u32,
}

impl Tracker<'_> {
    /// Applies `records` in order, then runs the implicit delete pass.
    pub fn apply(&mut self, records: &[ChangeRecord]) -> Result<SaveSummary, UowError> {
        let mut summary = SaveSummary::default();
        for record in records {
            match record {
                ChangeRecord::Update(update) => {
                    if self.apply_update(update)? {
                        summary.updated += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                ChangeRecord::Create(create) => {
                    self.apply_create(create)?;
                    summary.created += 1;
                }
            }
        }
        summary.deleted = self.mark_unreferenced();
        Ok(summary)
    }

    /// Returns false when the entity is not registered.
    fn apply_update(&mut self, record: &UpdateRecord) -> Result<bool, UowError> {
        let repository = record.repository_name.as_str();
        let descriptor = self
            .classmap
            .get(repository)
            .ok_or_else(|| UowError::UnknownRepository {
                repository: repository.to_string(),
            })?;
        let key = EntityKey::persisted(descriptor.short_name(), record.entity_id);
        let Some(entity) = self.registry.get_mut(repository, &key) else {
            tracing::warn!(repository, key = %key, "update for unregistered entity skipped");
            return Ok(false);
        };

        let mut data = record.data.clone();
        data.insert(ID_FIELD.to_string(), Value::from(record.entity_id));
        for (field, value) in data {
            entity.object.set(&field, value)?;
        }
        self.dirty.push_update(repository, key);
        Ok(true)
    }

    fn apply_create(&mut self, record: &CreateRecord) -> Result<(), UowError> {
        let repository = record.repository_name.as_str();
        let descriptor = self
            .classmap
            .get(repository)
            .ok_or_else(|| UowError::UnknownRepository {
                repository: repository.to_string(),
            })?;
        if self.registry.contains_uuid(&record.entity_uuid) {
            return Err(UowError::DuplicateUuid {
                uuid: record.entity_uuid.to_string(),
            });
        }

        let object = descriptor.factory().instantiate(record.data.clone())?;
        *self.next_pending += 1;
        let key = EntityKey::pending(descriptor.short_name(), *self.next_pending);
        let entity = RegisteredEntity::created(
            object,
            record.entity_uuid.clone(),
            record.parent_uuid.clone(),
        );
        self.registry.insert(repository, key.clone(), entity);
        self.dirty.push_create(repository, key);
        Ok(())
    }

    /// Clears the hash of every entity no create or update references and
    /// lists it for deletion. Returns how many were listed.
    fn mark_unreferenced(&mut self) -> usize {
        let mut marked = Vec::new();
        for (repository, entities) in self.registry.iter_mut() {
            for (key, entity) in entities.iter_mut() {
                if self.dirty.is_referenced(repository, key) {
                    continue;
                }
                entity.content_hash = None;
                marked.push((repository.clone(), key.clone()));
            }
        }
        let count = marked.len();
        for (repository, key) in marked {
            self.dirty.push_delete(&repository, key);
        }
        count
    }
}
