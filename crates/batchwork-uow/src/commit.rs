//! The three commit phases.
//!
//! Each phase receives the dirty list it works through and returns the
//! entries it left pending. All phases write through the same transaction;
//! the caller commits or rolls it back. Every registry change a phase makes
//! is journaled so it can be reverted when the transaction does not commit.

use serde::Serialize;
use serde_json::Value;

use batchwork_core::{Classmap, EntityKey, Persistable};
use batchwork_storage::Transaction;

use crate::dirty::{DirtyList, DirtySet};
use crate::error::UowError;
use crate::hash::ContentHash;
use crate::registry::{RegisteredEntity, Registry};

/// What a commit did to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageAction {
    Created,
    Updated,
    Deleted,
}

/// One entity touched by the most recent commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEntry {
    pub repository: String,
    pub key: EntityKey,
    pub action: StageAction,
    pub id: i64,
}

/// Entities touched by the most recent commit, in write order.
pub type Stage = Vec<StageEntry>;

/// Row counts written by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    fn from_stage(stage: &Stage) -> Self {
        let count = |action| stage.iter().filter(|e| e.action == action).count();
        CommitSummary {
            created: count(StageAction::Created),
            updated: count(StageAction::Updated),
            deleted: count(StageAction::Deleted),
        }
    }
}

/// A registry change made by a phase, with what is needed to revert it.
#[derive(Debug)]
enum JournalEntry {
    Created {
        repository: String,
        key: EntityKey,
        link: Option<(String, Value)>,
    },
    Updated {
        repository: String,
        key: EntityKey,
        hash: Option<ContentHash>,
    },
    Deleted {
        repository: String,
        key: EntityKey,
        entity: RegisteredEntity,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Reverts the journaled changes, newest first.
    fn revert(self, registry: &mut Registry) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                JournalEntry::Created { repository, key, link } => {
                    let Some(entity) = registry.get_mut(&repository, &key) else {
                        continue;
                    };
                    entity.object.clear_id();
                    entity.reset_hash(None);
                    if let Some((field, previous)) = link {
                        if let Err(err) = entity.object.set(&field, previous) {
                            tracing::warn!(
                                repository = repository.as_str(),
                                key = %key,
                                error = %err,
                                "parent link not restored"
                            );
                        }
                    }
                }
                JournalEntry::Updated { repository, key, hash } => {
                    if let Some(entity) = registry.get_mut(&repository, &key) {
                        entity.reset_hash(hash);
                    }
                }
                JournalEntry::Deleted { repository, key, entity } => {
                    registry.insert(&repository, key, entity);
                }
            }
        }
    }
}

/// The outcome of phases that all succeeded, held until the transaction
/// commits.
#[derive(Debug)]
pub(crate) struct Written {
    remaining: DirtySet,
    journal: Journal,
}

impl Written {
    /// Keeps the registry changes and installs the lists left pending.
    pub(crate) fn accept(self, dirty: &mut DirtySet, stage: &Stage) -> CommitSummary {
        *dirty = self.remaining;
        CommitSummary::from_stage(stage)
    }

    /// Reverts the registry changes of a transaction that did not commit.
    pub(crate) fn revert(self, registry: &mut Registry) {
        self.journal.revert(registry);
    }
}

/// Runs the create, update and delete phases in that order.
///
/// `dirty` is only read. When a phase fails the registry changes of the
/// earlier ones are reverted before the error is returned.
pub(crate) fn run_phases(
    tx: &mut dyn Transaction,
    classmap: &Classmap,
    registry: &mut Registry,
    dirty: &DirtySet,
    stage: &mut Stage,
) -> Result<Written, UowError> {
    let mut journal = Journal::default();
    match write_lists(tx, classmap, registry, dirty, stage, &mut journal) {
        Ok(remaining) => Ok(Written { remaining, journal }),
        Err(err) => {
            journal.revert(registry);
            Err(err)
        }
    }
}

fn write_lists(
    tx: &mut dyn Transaction,
    classmap: &Classmap,
    registry: &mut Registry,
    dirty: &DirtySet,
    stage: &mut Stage,
    journal: &mut Journal,
) -> Result<DirtySet, UowError> {
    let create = create_phase(tx, classmap, registry, dirty.create.clone(), stage, journal)?;
    let update = update_phase(tx, registry, dirty.update.clone(), stage, journal)?;
    let delete = delete_phase(tx, registry, dirty.delete.clone(), stage, journal)?;
    Ok(DirtySet {
        create,
        update,
        delete,
    })
}

/// Inserts pending creates, parents first. A child created with a parent
/// uuid gets the parent's new id in `<parent short name>id` first.
pub(crate) fn create_phase(
    tx: &mut dyn Transaction,
    classmap: &Classmap,
    registry: &mut Registry,
    pending: DirtyList,
    stage: &mut Stage,
    journal: &mut Journal,
) -> Result<DirtyList, UowError> {
    let mut remaining = DirtyList::with_capacity(pending.len());
    for (repository, keys) in pending {
        let mut left = Vec::new();
        for key in keys {
            let is_candidate = registry
                .get(&repository, &key)
                .is_some_and(|e| e.is_create_candidate());
            if !is_candidate {
                left.push(key);
                continue;
            }

            let link = registry
                .get(&repository, &key)
                .and_then(|e| e.parent_uuid())
                .and_then(|uuid| registry.locate_uuid(uuid))
                .and_then(|(parent_repository, parent_key)| {
                    let parent_id = registry.get(parent_repository, parent_key)?.id()?;
                    let field = classmap.get(parent_repository)?.foreign_key_field();
                    Some((field, parent_id))
                });

            let Some(entity) = registry.get_mut(&repository, &key) else {
                continue;
            };
            let previous_link = link.as_ref().and_then(|(field, _)| {
                let previous = entity.object.get(field)?.clone();
                Some((field.clone(), previous))
            });
            journal.entries.push(JournalEntry::Created {
                repository: repository.clone(),
                key: key.clone(),
                link: previous_link,
            });
            if let Some((field, parent_id)) = link {
                entity.object.set(&field, parent_id.into())?;
            }
            let id = tx.create(entity.object.as_mut())?;
            entity.rehash();
            stage.push(StageEntry {
                repository: repository.clone(),
                key,
                action: StageAction::Created,
                id,
            });
        }
        remaining.insert(repository, left);
    }
    Ok(remaining)
}

/// Writes entries whose fields changed since load. Unchanged entries stay
/// listed.
pub(crate) fn update_phase(
    tx: &mut dyn Transaction,
    registry: &mut Registry,
    pending: DirtyList,
    stage: &mut Stage,
    journal: &mut Journal,
) -> Result<DirtyList, UowError> {
    let mut remaining = DirtyList::with_capacity(pending.len());
    for (repository, keys) in pending {
        let mut left = Vec::new();
        for key in keys {
            let Some(entity) = registry.get_mut(&repository, &key) else {
                continue;
            };
            let Some(id) = entity.id() else {
                left.push(key);
                continue;
            };
            if !entity.has_changed() {
                left.push(key);
                continue;
            }
            tx.update(entity.object.as_ref())?;
            journal.entries.push(JournalEntry::Updated {
                repository: repository.clone(),
                key: key.clone(),
                hash: entity.content_hash,
            });
            entity.rehash();
            stage.push(StageEntry {
                repository: repository.clone(),
                key,
                action: StageAction::Updated,
                id,
            });
        }
        remaining.insert(repository, left);
    }
    Ok(remaining)
}

/// Deletes persisted entries without a hash, children first, and drops them
/// from the registry.
pub(crate) fn delete_phase(
    tx: &mut dyn Transaction,
    registry: &mut Registry,
    pending: DirtyList,
    stage: &mut Stage,
    journal: &mut Journal,
) -> Result<DirtyList, UowError> {
    let mut remaining = DirtyList::with_capacity(pending.len());
    for (repository, keys) in pending {
        let mut left = Vec::new();
        for key in keys {
            let Some(entity) = registry.get(&repository, &key) else {
                continue;
            };
            let Some(id) = entity.id().filter(|_| entity.is_delete_candidate()) else {
                left.push(key);
                continue;
            };
            tx.delete(entity.object())?;
            if let Some(entity) = registry.remove(&repository, &key) {
                journal.entries.push(JournalEntry::Deleted {
                    repository: repository.clone(),
                    key: key.clone(),
                    entity,
                });
            }
            stage.push(StageEntry {
                repository: repository.clone(),
                key,
                action: StageAction::Deleted,
                id,
            });
        }
        remaining.insert(repository, left);
    }
    Ok(remaining)
}
