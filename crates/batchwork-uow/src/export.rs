//! Snapshots of a clean unit of work, shaped as future update records.

use serde::{Deserialize, Serialize};

use batchwork_core::{Classmap, FieldMap};

use crate::registry::Registry;
use crate::tracker::ChangeRecord;

/// Current field values of one registered entity, `id` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "entityId")]
    pub entity_id: i64,
    #[serde(rename = "repositoryName")]
    pub repository_name: String,
    pub data: FieldMap,
}

impl From<ExportRecord> for ChangeRecord {
    fn from(record: ExportRecord) -> Self {
        ChangeRecord::update(record.entity_id, record.repository_name, record.data)
    }
}

/// Every persisted entity, in classmap order.
pub(crate) fn snapshot_registry(classmap: &Classmap, registry: &Registry) -> Vec<ExportRecord> {
    classmap
        .iter()
        .flat_map(|descriptor| {
            registry
                .entities(descriptor.repository())
                .filter_map(move |(_, entity)| {
                    Some(ExportRecord {
                        entity_id: entity.id()?,
                        repository_name: descriptor.repository().to_string(),
                        data: entity.object().snapshot(),
                    })
                })
        })
        .collect()
}
