//! Declarative shape descriptions.
//!
//! A shape is a closed set of variants, so every walk over a description
//! (extraction, rewriting, validation) is a total match rather than probing
//! untyped JSON. Descriptions serialize as tagged JSON, which is also how a
//! ShapeDefinition record stores its `definition` field:
//!
//! ```json
//! {"kind": "object", "fields": {
//!     "title": {"kind": "scalar", "scalar": "string", "required": true},
//!     "tags":  {"kind": "list_of", "items": {"kind": "scalar", "scalar": "string"}}
//! }}
//! ```

use crate::error::SchemaResult;
use covalent_types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Human-readable label attached to every record created from a shape.
pub const LABEL_FIELD: &str = "@label";
/// Back-reference from a record to the ShapeDefinition it was created from.
pub const SCHEMA_FIELD: &str = "@schema";
/// Name of the shape that describes shapes.
pub const META_SHAPE_NAME: &str = "@meta";

/// Returns true for fields the engine computes itself.
#[must_use]
pub fn is_system_field(name: &str) -> bool {
    name == LABEL_FIELD || name == SCHEMA_FIELD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
    /// Any JSON value, stored opaquely.
    Json,
}

/// Target of a reference field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeRef {
    /// A registered ShapeDefinition.
    Id(RecordId),
    /// Placeholder for a sub-shape extracted at this structural path and
    /// not yet created.
    Path(String),
    /// Another top-level shape, by registry name.
    Named(String),
    /// The shape the field belongs to.
    Itself,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Scalar { scalar: ScalarType },
    Reference { to: ShapeRef },
    ListOf { items: Box<Shape> },
    StreamOf { items: Box<Shape> },
    Object(ObjectShape),
}

impl Shape {
    #[must_use]
    pub fn string() -> Self {
        Self::Scalar {
            scalar: ScalarType::String,
        }
    }

    #[must_use]
    pub fn number() -> Self {
        Self::Scalar {
            scalar: ScalarType::Number,
        }
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::Scalar {
            scalar: ScalarType::Integer,
        }
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::Scalar {
            scalar: ScalarType::Boolean,
        }
    }

    #[must_use]
    pub fn json() -> Self {
        Self::Scalar {
            scalar: ScalarType::Json,
        }
    }

    #[must_use]
    pub fn reference(id: RecordId) -> Self {
        Self::Reference {
            to: ShapeRef::Id(id),
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Reference {
            to: ShapeRef::Named(name.into()),
        }
    }

    #[must_use]
    pub fn itself() -> Self {
        Self::Reference {
            to: ShapeRef::Itself,
        }
    }

    #[must_use]
    pub fn list_of(items: Shape) -> Self {
        Self::ListOf {
            items: Box::new(items),
        }
    }

    #[must_use]
    pub fn stream_of(items: Shape) -> Self {
        Self::StreamOf {
            items: Box::new(items),
        }
    }

    #[must_use]
    pub fn object(shape: ObjectShape) -> Self {
        Self::Object(shape)
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar { .. } => "scalar",
            Self::Reference { .. } => "reference",
            Self::ListOf { .. } => "list_of",
            Self::StreamOf { .. } => "stream_of",
            Self::Object(_) => "object",
        }
    }

    /// True if an object shape appears anywhere inside, this one included.
    #[must_use]
    pub fn contains_object(&self) -> bool {
        match self {
            Self::Scalar { .. } | Self::Reference { .. } => false,
            Self::ListOf { items } | Self::StreamOf { items } => items.contains_object(),
            Self::Object(_) => true,
        }
    }

    /// Rebuilds the shape with every reference passed through `f`.
    pub fn map_refs(
        &self,
        f: &mut impl FnMut(&ShapeRef) -> SchemaResult<ShapeRef>,
    ) -> SchemaResult<Shape> {
        Ok(match self {
            Self::Scalar { scalar } => Self::Scalar { scalar: *scalar },
            Self::Reference { to } => Self::Reference { to: f(to)? },
            Self::ListOf { items } => Self::ListOf {
                items: Box::new(items.map_refs(f)?),
            },
            Self::StreamOf { items } => Self::StreamOf {
                items: Box::new(items.map_refs(f)?),
            },
            Self::Object(object) => Self::Object(object.map_refs(f)?),
        })
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a ShapeRef>) {
        match self {
            Self::Scalar { .. } => {}
            Self::Reference { to } => out.push(to),
            Self::ListOf { items } | Self::StreamOf { items } => items.collect_refs(out),
            Self::Object(object) => {
                for field in object.fields.values() {
                    field.shape.collect_refs(out);
                }
            }
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

/// An object shape: named fields, each with a shape and required-ness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectShape {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
}

impl ObjectShape {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn required(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                shape,
                required: true,
            },
        );
        self
    }

    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                shape,
                required: false,
            },
        );
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.required)
            .map(|(name, _)| name.as_str())
    }

    /// True if any field nests an object shape inline.
    #[must_use]
    pub fn has_nested_objects(&self) -> bool {
        self.fields.values().any(|def| def.shape.contains_object())
    }

    /// Adds `@label` and `@schema` if absent. Both are forced optional:
    /// the engine fills them, callers never supply them.
    #[must_use]
    pub fn with_system_fields(&self) -> ObjectShape {
        let mut out = self.clone();
        out.fields
            .entry(LABEL_FIELD.to_string())
            .or_insert_with(|| FieldDef {
                shape: Shape::string(),
                required: false,
            })
            .required = false;
        out.fields
            .entry(SCHEMA_FIELD.to_string())
            .or_insert_with(|| FieldDef {
                shape: Shape::named(META_SHAPE_NAME),
                required: false,
            })
            .required = false;
        out
    }

    pub fn map_refs(
        &self,
        f: &mut impl FnMut(&ShapeRef) -> SchemaResult<ShapeRef>,
    ) -> SchemaResult<ObjectShape> {
        let mut fields = BTreeMap::new();
        for (name, def) in &self.fields {
            fields.insert(
                name.clone(),
                FieldDef {
                    shape: def.shape.map_refs(f)?,
                    required: def.required,
                },
            );
        }
        Ok(ObjectShape { fields })
    }

    /// Every reference target in this shape, nested objects included.
    #[must_use]
    pub fn references(&self) -> Vec<&ShapeRef> {
        let mut out = Vec::new();
        for def in self.fields.values() {
            def.shape.collect_refs(&mut out);
        }
        out
    }

    /// Names referenced through [`ShapeRef::Named`].
    #[must_use]
    pub fn named_dependencies(&self) -> BTreeSet<String> {
        self.references()
            .into_iter()
            .filter_map(|r| match r {
                ShapeRef::Named(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}
