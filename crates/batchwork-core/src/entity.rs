//! The persistable entity contract and its schema-driven implementation.
//!
//! The unit of work treats entities as opaque [`Persistable`] objects: it only
//! needs a table, an id, field access and a snapshot. An [`EntityFactory`]
//! builds instances for one entity type, either from data submitted by a
//! caller or from a row read back from the store.
//!
//! [`SchemaEntity`] / [`SchemaFactory`] implement both traits on top of an
//! [`EntitySchema`], so entity types can be declared as data.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CoreError;
use crate::schema::{EntitySchema, ID_FIELD};
use crate::value::{as_i64, FieldMap, Row};

/// An entity that can be written to a store.
pub trait Persistable: fmt::Debug {
    /// Table this entity is stored in.
    fn table(&self) -> &str;

    /// Persisted row id, `None` until the entity has been created.
    fn id(&self) -> Option<i64>;

    /// Records the id assigned by the store on insert.
    fn assign_id(&mut self, id: i64);

    /// Forgets an id whose insert was rolled back.
    fn clear_id(&mut self);

    /// Current value of a field.
    fn get(&self, field: &str) -> Option<&Value>;

    /// Assigns a field, validating it against the entity's definition.
    fn set(&mut self, field: &str, value: Value) -> Result<(), CoreError>;

    /// All current field values, including `id`.
    fn snapshot(&self) -> FieldMap;

    /// Checks the entity is complete enough to be written.
    fn validate(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Builds [`Persistable`] instances for one entity type.
pub trait EntityFactory: fmt::Debug {
    /// Table the built entities live in.
    fn table(&self) -> &str;

    /// A new, not-yet-persisted entity populated from submitted data.
    fn instantiate(&self, data: FieldMap) -> Result<Box<dyn Persistable>, CoreError>;

    /// An entity rebuilt from a stored row.
    fn hydrate(&self, row: Row) -> Result<Box<dyn Persistable>, CoreError>;
}

/// Entity whose fields are governed by an [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct SchemaEntity {
    schema: Arc<EntitySchema>,
    data: FieldMap,
}

impl SchemaEntity {
    /// Builds an entity from defaults overlaid with `data`.
    ///
    /// The store assigns ids, so a submitted `id` is discarded.
    pub fn new(schema: Arc<EntitySchema>, mut data: FieldMap) -> Result<Self, CoreError> {
        data.remove(ID_FIELD);

        let mut initial = FieldMap::new();
        for def in schema.fields() {
            if let Some(value) = def.initial_value() {
                initial.insert(def.name.clone(), value);
            }
        }

        let mut entity = SchemaEntity {
            schema,
            data: initial,
        };
        for (field, value) in data {
            entity.set(&field, value)?;
        }
        Ok(entity)
    }

    /// Rebuilds an entity from a stored row. Columns the schema does not
    /// declare are ignored; nulls are kept as read.
    pub fn from_row(schema: Arc<EntitySchema>, row: Row) -> Result<Self, CoreError> {
        let mut data = FieldMap::new();
        for (column, value) in row {
            if schema.get(&column).is_none() {
                continue;
            }
            let value = if value.is_null() {
                Value::Null
            } else {
                schema.coerce(&column, value)?
            };
            data.insert(column, value);
        }
        Ok(SchemaEntity { schema, data })
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }
}

impl Persistable for SchemaEntity {
    fn table(&self) -> &str {
        self.schema.table()
    }

    fn id(&self) -> Option<i64> {
        self.data.get(ID_FIELD).and_then(as_i64).filter(|id| *id > 0)
    }

    fn assign_id(&mut self, id: i64) {
        self.data.insert(ID_FIELD.to_string(), Value::from(id));
    }

    fn clear_id(&mut self) {
        self.data.insert(ID_FIELD.to_string(), Value::Null);
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), CoreError> {
        let value = self.schema.coerce(field, value)?;
        self.data.insert(field.to_string(), value);
        Ok(())
    }

    fn snapshot(&self) -> FieldMap {
        self.data.clone()
    }

    fn validate(&self) -> Result<(), CoreError> {
        for def in self.schema.fields() {
            if def.nullable || def.name == ID_FIELD {
                continue;
            }
            match self.data.get(&def.name) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(CoreError::MissingField {
                        table: self.schema.table().to_string(),
                        field: def.name.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// [`EntityFactory`] producing [`SchemaEntity`] instances.
#[derive(Debug, Clone)]
pub struct SchemaFactory {
    schema: Arc<EntitySchema>,
}

impl SchemaFactory {
    pub fn new(schema: EntitySchema) -> Self {
        SchemaFactory {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }
}

impl EntityFactory for SchemaFactory {
    fn table(&self) -> &str {
        self.schema.table()
    }

    fn instantiate(&self, data: FieldMap) -> Result<Box<dyn Persistable>, CoreError> {
        Ok(Box::new(SchemaEntity::new(Arc::clone(&self.schema), data)?))
    }

    fn hydrate(&self, row: Row) -> Result<Box<dyn Persistable>, CoreError> {
        Ok(Box::new(SchemaEntity::from_row(Arc::clone(&self.schema), row)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldKind};
    use serde_json::json;

    fn wave_factory() -> SchemaFactory {
        SchemaFactory::new(
            EntitySchema::new("simulation_wave")
                .field(FieldDef::new("name", FieldKind::Text))
                .field(FieldDef::new("description", FieldKind::Text).nullable())
                .field(FieldDef::new("simulationid", FieldKind::Int)),
        )
    }

    fn map(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_instantiate_applies_defaults_and_data() {
        let entity = wave_factory()
            .instantiate(map(json!({"name": "Wave 1", "simulationid": "4"})))
            .unwrap();
        assert_eq!(entity.table(), "simulation_wave");
        assert_eq!(entity.id(), None);
        assert_eq!(entity.get("name"), Some(&json!("Wave 1")));
        assert_eq!(entity.get("simulationid"), Some(&json!(4)));
        assert_eq!(entity.get("description"), Some(&Value::Null));
        assert!(entity.validate().is_ok());
    }

    #[test]
    fn test_instantiate_discards_submitted_id() {
        let entity = wave_factory()
            .instantiate(map(json!({"id": 99, "name": "w", "simulationid": 1})))
            .unwrap();
        assert_eq!(entity.id(), None);
    }

    #[test]
    fn test_instantiate_rejects_unknown_field() {
        let err = wave_factory()
            .instantiate(map(json!({"name": "w", "colour": "red"})))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));
    }

    #[test]
    fn test_validate_reports_missing_required_field() {
        let entity = wave_factory()
            .instantiate(map(json!({"name": "w"})))
            .unwrap();
        let err = entity.validate().unwrap_err();
        assert!(matches!(err, CoreError::MissingField { ref field, .. } if field == "simulationid"));
    }

    #[test]
    fn test_hydrate_ignores_undeclared_columns() {
        let entity = wave_factory()
            .hydrate(map(json!({
                "id": 7,
                "name": "w",
                "description": null,
                "simulationid": 2,
                "legacy_column": "x"
            })))
            .unwrap();
        assert_eq!(entity.id(), Some(7));
        assert!(entity.get("legacy_column").is_none());
        assert_eq!(entity.snapshot().len(), 4);
    }

    #[test]
    fn test_assign_id_makes_entity_persisted() {
        let mut entity = wave_factory()
            .instantiate(map(json!({"name": "w", "simulationid": 1})))
            .unwrap();
        entity.assign_id(12);
        assert_eq!(entity.id(), Some(12));
        assert_eq!(entity.snapshot()["id"], json!(12));
    }

    #[test]
    fn test_clear_id_returns_entity_to_pending() {
        let mut entity = wave_factory()
            .instantiate(map(json!({"name": "w", "simulationid": 1})))
            .unwrap();
        entity.assign_id(12);
        entity.clear_id();
        assert_eq!(entity.id(), None);
        assert_eq!(entity.snapshot()["id"], Value::Null);
    }
}
