//! Shape compilation.
//!
//! Compiling a description pulls every inline object out into its own
//! definition and leaves a [`ShapeRef::Path`] placeholder where it was. The
//! registry later creates each extracted shape and swaps the placeholder for
//! the real id, so no stored definition ever embeds another object shape.

use crate::error::{SchemaError, SchemaResult};
use crate::shape::{FieldDef, ObjectShape, Shape, ShapeRef};

/// Path segment used for the elements of a list or stream.
pub const ITEMS_SEGMENT: &str = "items";

/// A sub-shape pulled out of a description.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedShape {
    /// Structural path inside the top-level description, e.g. `avatar` or
    /// `subtasks/items`.
    pub path: String,
    pub shape: ObjectShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShape {
    /// The top-level shape, with system fields and placeholders.
    pub root: ObjectShape,
    /// Extracted sub-shapes, deepest first: every shape appears after all
    /// shapes its placeholders point at.
    pub extracted: Vec<ExtractedShape>,
}

impl CompiledShape {
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.extracted.is_empty()
    }
}

/// Compiles a top-level description.
///
/// # Errors
///
/// Returns [`SchemaError::NotAnObject`] if `description` is not an object.
pub fn compile(description: &Shape) -> SchemaResult<CompiledShape> {
    let Shape::Object(object) = description else {
        return Err(SchemaError::NotAnObject(description.kind_name()));
    };

    if !object.has_nested_objects() {
        return Ok(CompiledShape {
            root: object.with_system_fields(),
            extracted: Vec::new(),
        });
    }

    let mut extracted = Vec::new();
    let root = extract_object(object, "", &mut extracted).with_system_fields();
    Ok(CompiledShape { root, extracted })
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}

fn extract_object(
    object: &ObjectShape,
    prefix: &str,
    out: &mut Vec<ExtractedShape>,
) -> ObjectShape {
    let fields = object
        .fields
        .iter()
        .map(|(name, def)| {
            let shape = extract(&def.shape, &join(prefix, name), out);
            (
                name.clone(),
                FieldDef {
                    shape,
                    required: def.required,
                },
            )
        })
        .collect();
    ObjectShape { fields }
}

fn extract(shape: &Shape, path: &str, out: &mut Vec<ExtractedShape>) -> Shape {
    match shape {
        Shape::Scalar { .. } | Shape::Reference { .. } => shape.clone(),
        Shape::ListOf { items } => Shape::ListOf {
            items: Box::new(extract(items, &join(path, ITEMS_SEGMENT), out)),
        },
        Shape::StreamOf { items } => Shape::StreamOf {
            items: Box::new(extract(items, &join(path, ITEMS_SEGMENT), out)),
        },
        Shape::Object(object) => {
            // Children go first so the parent can be rewritten against them.
            let child = extract_object(object, path, out);
            out.push(ExtractedShape {
                path: path.to_string(),
                shape: child.with_system_fields(),
            });
            Shape::Reference {
                to: ShapeRef::Path(path.to_string()),
            }
        }
    }
}
