//! Entities as seen by application code.

use covalent_schema::{is_system_field, LABEL_FIELD, SCHEMA_FIELD};
use covalent_store::{Record, StoreResult};
use covalent_types::{AccountId, GroupId, HybridTimestamp, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A data record created against a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: RecordId,
    /// The ShapeDefinition the entity was created from.
    pub shape_id: Option<RecordId>,
    pub label: Option<String>,
    /// User fields only; system fields are surfaced above.
    pub data: Map<String, Value>,
    pub owner: GroupId,
    pub created_by: AccountId,
    pub created_at: HybridTimestamp,
    pub modified_at: HybridTimestamp,
}

impl Entity {
    /// Reads an entity out of a map record.
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let data = record
            .as_map()?
            .to_json()
            .into_iter()
            .filter(|(key, _)| !is_system_field(key))
            .collect();
        Ok(Self {
            id: record.id(),
            shape_id: record.reference(SCHEMA_FIELD),
            label: record.str_field(LABEL_FIELD).map(str::to_string),
            data,
            owner: record.owner(),
            created_by: record.header.created_by,
            created_at: record.header.created_at,
            modified_at: record.modified_at(),
        })
    }

    /// Looks a value up by JSON pointer into the entity's data, e.g.
    /// `/title` or `/meta/tags/0`. A bare field name also works.
    #[must_use]
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        let path = pointer.strip_prefix('/').unwrap_or(pointer);
        match path.split_once('/') {
            Some((head, rest)) => self.data.get(head)?.pointer(&format!("/{rest}")),
            None => self.data.get(path),
        }
    }

    #[must_use]
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.get(pointer).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.get(pointer).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.get(pointer).and_then(Value::as_f64)
    }

    /// A field read as a record reference.
    #[must_use]
    pub fn get_reference(&self, field: &str) -> Option<RecordId> {
        self.get_str(field).and_then(|s| RecordId::parse(s).ok())
    }
}
