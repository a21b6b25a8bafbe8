//! Validation of record data against a compiled shape.

use crate::error::{SchemaError, SchemaResult};
use crate::shape::{is_system_field, FieldDef, ObjectShape, ScalarType, Shape, ShapeRef};
use covalent_types::RecordId;
use serde_json::{Map, Value};

/// A compiled shape ready to check record data.
///
/// Values are checked one level deep: a reference field accepts either an
/// existing record id or an object (to be created as a child record), but
/// the object's own fields are checked against the child's shape, which the
/// caller loads through [`RecordShape::resolve_ref`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    /// Id of the ShapeDefinition, once it exists. `Itself` references
    /// resolve against it.
    pub id: Option<RecordId>,
    pub name: String,
    pub shape: ObjectShape,
}

impl RecordShape {
    #[must_use]
    pub fn new(id: Option<RecordId>, name: impl Into<String>, shape: ObjectShape) -> Self {
        Self {
            id,
            name: name.into(),
            shape,
        }
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::Validation {
            shape: self.name.clone(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn field_def(&self, field: &str) -> SchemaResult<&FieldDef> {
        self.shape
            .field(field)
            .ok_or_else(|| self.invalid(field, "unknown field"))
    }

    /// Checks data for a new record.
    ///
    /// System fields are skipped (the engine overwrites them), every
    /// required field must be present and non-null, unknown fields are
    /// rejected.
    pub fn validate(&self, data: &Map<String, Value>) -> SchemaResult<()> {
        for (key, value) in data {
            if is_system_field(key) {
                continue;
            }
            self.validate_field(key, value)?;
        }
        for required in self.shape.required_fields() {
            if is_system_field(required) {
                continue;
            }
            if data.get(required).is_none_or(Value::is_null) {
                return Err(self.invalid(required, "required field is missing"));
            }
        }
        Ok(())
    }

    /// Checks a partial update. Only the supplied fields are checked;
    /// `null` clears a field and is refused for required ones.
    pub fn validate_partial(&self, data: &Map<String, Value>) -> SchemaResult<()> {
        for (key, value) in data {
            if is_system_field(key) {
                return Err(self.invalid(key, "system fields cannot be written"));
            }
            let def = self.field_def(key)?;
            if value.is_null() {
                if def.required {
                    return Err(self.invalid(key, "required field cannot be cleared"));
                }
                continue;
            }
            check_value(&def.shape, value).map_err(|reason| self.invalid(key, reason))?;
        }
        Ok(())
    }

    /// Checks one field value. `null` passes; required-ness is checked by
    /// the record-level methods.
    pub fn validate_field(&self, field: &str, value: &Value) -> SchemaResult<()> {
        let def = self.field_def(field)?;
        if value.is_null() {
            return Ok(());
        }
        check_value(&def.shape, value).map_err(|reason| self.invalid(field, reason))
    }

    /// The ShapeDefinition a reference points at, if it is resolved.
    #[must_use]
    pub fn resolve_ref(&self, target: &ShapeRef) -> Option<RecordId> {
        match target {
            ShapeRef::Id(id) => Some(*id),
            ShapeRef::Itself => self.id,
            ShapeRef::Path(_) | ShapeRef::Named(_) => None,
        }
    }

    /// User fields, in order, excluding system fields.
    pub fn user_fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.shape
            .fields
            .iter()
            .filter(|(name, _)| !is_system_field(name))
            .map(|(name, def)| (name.as_str(), def))
    }
}

fn is_record_id(value: &Value) -> bool {
    value.as_str().is_some_and(|s| RecordId::parse(s).is_ok())
}

fn check_scalar(scalar: ScalarType, value: &Value) -> Result<(), String> {
    let ok = match scalar {
        ScalarType::String => value.is_string(),
        ScalarType::Number => value.is_number(),
        ScalarType::Integer => value.is_i64() || value.is_u64(),
        ScalarType::Boolean => value.is_boolean(),
        ScalarType::Json => true,
    };
    if ok {
        Ok(())
    } else {
        let expected = match scalar {
            ScalarType::String => "a string",
            ScalarType::Number => "a number",
            ScalarType::Integer => "an integer",
            ScalarType::Boolean => "a boolean",
            ScalarType::Json => "json",
        };
        Err(format!("expected {expected}, got {value}"))
    }
}

fn check_value(shape: &Shape, value: &Value) -> Result<(), String> {
    match shape {
        Shape::Scalar { scalar } => check_scalar(*scalar, value),
        Shape::Reference { .. } => {
            if value.is_object() || is_record_id(value) {
                Ok(())
            } else {
                Err(format!("expected a record id or object, got {value}"))
            }
        }
        Shape::ListOf { items } | Shape::StreamOf { items } => match value {
            Value::Array(values) => {
                for (index, item) in values.iter().enumerate() {
                    check_value(items, item).map_err(|reason| format!("item {index}: {reason}"))?;
                }
                Ok(())
            }
            _ if is_record_id(value) => Ok(()),
            _ => Err(format!("expected an array or record id, got {value}")),
        },
        Shape::Object(object) => match value {
            Value::Object(map) => check_object(object, map),
            _ => Err(format!("expected an object, got {value}")),
        },
    }
}

fn check_object(object: &ObjectShape, map: &Map<String, Value>) -> Result<(), String> {
    for (key, value) in map {
        let Some(def) = object.field(key) else {
            return Err(format!("unknown field {key}"));
        };
        if !value.is_null() {
            check_value(&def.shape, value).map_err(|reason| format!("{key}: {reason}"))?;
        }
    }
    for required in object.required_fields() {
        if map.get(required).is_none_or(Value::is_null) {
            return Err(format!("missing required field {required}"));
        }
    }
    Ok(())
}
