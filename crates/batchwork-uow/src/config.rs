//! Unit-of-work configuration: the root scope and optional behaviors.

use serde::{Deserialize, Serialize};

use crate::error::UowError;

/// Root scope and options of a unit of work.
///
/// Deserializes from camelCase JSON; every field is optional.
///
/// ```json
/// { "mainTableName": "simulation", "mainTableKey": 1,
///   "childParentIdColumn": "simulationid", "enableCascadeIntegrity": false }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UowConfig {
    /// Table holding the root scope row.
    pub main_table_name: String,
    /// Id of the root scope row. Zero means unset.
    pub main_table_key: i64,
    /// Column on root-type tables referencing the scope row.
    #[serde(alias = "childParentIdColumnOverride")]
    pub child_parent_id_column: Option<String>,
    /// Install `ON DELETE CASCADE` constraints at construction.
    pub enable_cascade_integrity: bool,
}

impl UowConfig {
    pub fn new(main_table_name: impl Into<String>, main_table_key: i64) -> Self {
        UowConfig {
            main_table_name: main_table_name.into(),
            main_table_key,
            ..UowConfig::default()
        }
    }

    pub fn with_child_parent_id_column(mut self, column: impl Into<String>) -> Self {
        self.child_parent_id_column = Some(column.into());
        self
    }

    pub fn with_cascade_integrity(mut self, enabled: bool) -> Self {
        self.enable_cascade_integrity = enabled;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, UowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The override column, treating an empty string as unset.
    pub fn child_parent_id_column(&self) -> Option<&str> {
        self.child_parent_id_column
            .as_deref()
            .filter(|c| !c.is_empty())
    }

    /// Whether both the main table and a non-zero key are set.
    pub fn has_scope(&self) -> bool {
        !self.main_table_name.is_empty() && self.main_table_key != 0
    }
}
