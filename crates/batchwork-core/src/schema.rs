//! Field definitions for schema-driven entities.
//!
//! An [`EntitySchema`] names a table and declares its fields with a kind,
//! nullability and an optional default. Every schema carries an implicit
//! nullable integer `id` field, which the store fills in on insert.
//!
//! Values assigned to a field are coerced into its kind: integer fields
//! accept numeric strings (`"20220311110000"`), text fields accept numbers,
//! boolean fields accept `0`/`1`. Anything else is a
//! [`CoreError::TypeMismatch`].

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::CoreError;
use crate::value::as_i64;

/// Name of the implicit primary key field.
pub const ID_FIELD: &str = "id";

/// Storage kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Float,
    Text,
    Bool,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Value a field takes when an entity is constructed without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDefault {
    /// A fixed value.
    Value(Value),
    /// Seconds since the Unix epoch at construction time.
    UnixNow,
}

impl FieldDefault {
    fn resolve(&self) -> Value {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::UnixNow => {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                Value::from(secs)
            }
        }
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<FieldDefault>,
}

impl FieldDef {
    /// A required (non-null, no default) field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Defaults to the current Unix timestamp (e.g. `timecreated`).
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::UnixNow);
        self
    }

    /// Initial value for a freshly constructed entity, if any.
    pub(crate) fn initial_value(&self) -> Option<Value> {
        match &self.default {
            Some(default) => Some(default.resolve()),
            None if self.nullable => Some(Value::Null),
            None => None,
        }
    }
}

/// Table name plus ordered field declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    table: String,
    fields: IndexMap<String, FieldDef>,
}

impl EntitySchema {
    /// Creates a schema for `table` containing only the implicit `id` field.
    pub fn new(table: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(
            ID_FIELD.to_string(),
            FieldDef::new(ID_FIELD, FieldKind::Int).nullable(),
        );
        EntitySchema {
            table: table.into(),
            fields,
        }
    }

    /// Adds (or replaces) a field declaration.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.insert(def.name.clone(), def);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Coerces `value` into the declared kind of `field`.
    pub fn coerce(&self, field: &str, value: Value) -> Result<Value, CoreError> {
        let def = self.fields.get(field).ok_or_else(|| CoreError::UnknownField {
            table: self.table.clone(),
            field: field.to_string(),
        })?;

        if value.is_null() {
            return if def.nullable {
                Ok(Value::Null)
            } else {
                Err(CoreError::NullNotAllowed {
                    table: self.table.clone(),
                    field: field.to_string(),
                })
            };
        }

        let coerced = match def.kind {
            FieldKind::Int => as_i64(&value).map(Value::from),
            FieldKind::Float => match &value {
                Value::Number(n) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            FieldKind::Text => match &value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                _ => None,
            },
            FieldKind::Bool => match &value {
                Value::Bool(_) => Some(value.clone()),
                Value::Number(_) | Value::String(_) => match as_i64(&value) {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => match value.as_str() {
                        Some("true") => Some(Value::Bool(true)),
                        Some("false") => Some(Value::Bool(false)),
                        _ => None,
                    },
                },
                _ => None,
            },
        };

        coerced.ok_or_else(|| CoreError::TypeMismatch {
            table: self.table.clone(),
            field: field.to_string(),
            expected: def.kind,
            found: value.to_string(),
        })
    }
}
