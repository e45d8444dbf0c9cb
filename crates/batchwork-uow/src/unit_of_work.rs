//! The [`UnitOfWork`]: load a scope, accept changes, commit them once.
//!
//! Lifecycle: construction orders the classmap, optionally installs cascade
//! constraints and loads the scope. `save` may be called any number of times
//! and replaces the pending change set on each call. `commit` writes the
//! pending changes in a single transaction and finalizes the unit of work;
//! later calls are refused. A unit of work that goes out of scope without
//! having been committed commits itself.

use std::sync::Arc;

use batchwork_core::{Classmap, EntityDescriptor, Row};
use batchwork_storage::Store;

use crate::cascade::{self, CascadeLink, CascadeOutcome};
use crate::commit::{self, CommitSummary, Stage};
use crate::config::UowConfig;
use crate::dirty::DirtySet;
use crate::error::UowError;
use crate::export::{self, ExportRecord};
use crate::loader::{self, LoadSummary};
use crate::notify::{NotificationSink, TracingSink};
use crate::registry::Registry;
use crate::tracker::{ChangeRecord, SaveSummary, Tracker};

/// Tracks one scope of entities and commits changes to it atomically.
pub struct UnitOfWork<'s> {
    store: &'s mut dyn Store,
    config: UowConfig,
    classmap: Classmap,
    main_table_settings: Vec<Row>,
    registry: Registry,
    dirty: DirtySet,
    stage: Stage,
    sink: Arc<dyn NotificationSink>,
    next_pending: u32,
    committed: bool,
}

impl<'s> UnitOfWork<'s> {
    /// Builds a unit of work that reports failures through `tracing`.
    pub fn new(
        store: &'s mut dyn Store,
        descriptors: Vec<EntityDescriptor>,
        config: UowConfig,
    ) -> Result<Self, UowError> {
        Self::new_with_sink(store, descriptors, config, Arc::new(TracingSink))
    }

    /// Orders the classmap, installs cascade constraints when enabled and
    /// loads the configured scope.
    ///
    /// A scope that is not configured or not found leaves the unit of work
    /// empty rather than failing; [`UnitOfWork::load`] reports it. Invalid
    /// classmaps and store errors fail construction.
    pub fn new_with_sink(
        store: &'s mut dyn Store,
        descriptors: Vec<EntityDescriptor>,
        config: UowConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, UowError> {
        let classmap = Classmap::ordered(descriptors)?;
        let dirty = DirtySet::skeleton(&classmap);
        let mut uow = UnitOfWork {
            store,
            config,
            classmap,
            main_table_settings: Vec::new(),
            registry: Registry::new(),
            dirty,
            stage: Stage::new(),
            sink,
            next_pending: 0,
            committed: false,
        };

        if uow.config.enable_cascade_integrity {
            uow.ensure_cascade_integrity();
        }

        match uow.load() {
            Ok(_) => {}
            Err(err) if err.is_scope_error() => {
                tracing::warn!(error = %err, "unit of work scope not loaded");
            }
            Err(err) => {
                // Never handed out, so it must not commit on drop.
                uow.committed = true;
                return Err(err);
            }
        }
        Ok(uow)
    }

    /// Replaces the registry with the current contents of the scope and
    /// drops pending changes.
    ///
    /// On failure the registry and main table settings are left empty.
    pub fn load(&mut self) -> Result<LoadSummary, UowError> {
        if self.committed {
            return Err(UowError::AlreadyCommitted);
        }
        self.registry = Registry::new();
        self.main_table_settings.clear();
        self.dirty = DirtySet::skeleton(&self.classmap);
        self.stage.clear();
        let scope = loader::load_scope(&*self.store, &self.classmap, &self.config)?;
        self.registry = scope.registry;
        self.main_table_settings = scope.main_rows;
        tracing::debug!(entities = scope.summary.total(), "unit of work loaded");
        Ok(scope.summary)
    }

    /// Applies a batch of change records.
    ///
    /// Each call rebuilds the dirty lists from scratch, forgets entities
    /// created by an earlier call and clears its delete marks. Every loaded
    /// entity the batch does not
    /// reference is scheduled for deletion. On error the in-memory state is
    /// partially applied and the unit of work should be discarded.
    pub fn save(&mut self, records: &[ChangeRecord]) -> Result<SaveSummary, UowError> {
        if self.committed {
            return Err(UowError::AlreadyCommitted);
        }
        if self.classmap.is_empty() {
            return Err(UowError::EmptyClassmap);
        }
        self.dirty = DirtySet::skeleton(&self.classmap);
        let discarded = self.registry.discard_pending();
        if discarded > 0 {
            tracing::debug!(discarded, "dropped creates of a previous save");
        }
        let restored = self.registry.restore_hashes();
        if restored > 0 {
            tracing::debug!(restored, "cleared delete marks of a previous save");
        }

        let mut tracker = Tracker {
            classmap: &self.classmap,
            registry: &mut self.registry,
            dirty: &mut self.dirty,
            next_pending: &mut self.next_pending,
        };
        let summary = tracker.apply(records)?;
        tracing::debug!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            deleted = summary.deleted,
            "change records applied"
        );
        Ok(summary)
    }

    /// Writes pending changes in one transaction and finalizes the unit of
    /// work.
    ///
    /// Returns `false` only when already committed. Store errors roll the
    /// transaction back, leave the registry and dirty lists as they were and
    /// go to the notification sink; the unit of work is committed either way. Use [`UnitOfWork::try_commit`] to receive them.
    pub fn commit(&mut self) -> bool {
        if self.committed {
            return false;
        }
        if let Err(err) = self.try_commit() {
            self.sink.notify(&format!("commit failed: {err}"));
        }
        self.committed
    }

    /// Like [`UnitOfWork::commit`], but returns the outcome.
    pub fn try_commit(&mut self) -> Result<CommitSummary, UowError> {
        if self.committed {
            return Err(UowError::AlreadyCommitted);
        }
        self.committed = true;
        self.stage.clear();

        let mut tx = self.store.begin()?;
        let result = commit::run_phases(
            tx.as_mut(),
            &self.classmap,
            &mut self.registry,
            &self.dirty,
            &mut self.stage,
        );
        let written = match result {
            Ok(written) => written,
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                self.stage.clear();
                return Err(err);
            }
        };
        if let Err(err) = tx.commit() {
            written.revert(&mut self.registry);
            self.stage.clear();
            return Err(err.into());
        }

        let summary = written.accept(&mut self.dirty, &self.stage);
        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "unit of work committed"
        );
        Ok(summary)
    }

    /// Commits unless already committed. Same result as
    /// [`UnitOfWork::commit`].
    pub fn close(mut self) -> bool {
        self.commit()
    }

    /// Snapshots of every registered entity, usable as update records.
    pub fn export_data(&self) -> Result<Vec<ExportRecord>, UowError> {
        if self.is_dirty() {
            return Err(UowError::NotExportable { state: "dirty" });
        }
        if self.committed {
            return Err(UowError::NotExportable { state: "committed" });
        }
        Ok(export::snapshot_registry(&self.classmap, &self.registry))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_clean()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Installs `ON DELETE CASCADE` constraints for every parent/child pair.
    pub fn ensure_cascade_integrity(&mut self) -> Vec<(CascadeLink, CascadeOutcome)> {
        cascade::ensure(&mut *self.store, &self.classmap, self.sink.as_ref())
    }

    /// Drops the constraints installed by
    /// [`UnitOfWork::ensure_cascade_integrity`].
    pub fn remove_cascade_integrity(&mut self) -> Vec<(CascadeLink, CascadeOutcome)> {
        cascade::remove(&mut *self.store, &self.classmap, self.sink.as_ref())
    }

    pub fn classmap(&self) -> &Classmap {
        &self.classmap
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Rows of the main table for the configured scope.
    pub fn main_table_settings(&self) -> &[Row] {
        &self.main_table_settings
    }

    pub fn config(&self) -> &UowConfig {
        &self.config
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.commit();
        }
    }
}
