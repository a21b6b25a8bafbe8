//! The meta-shape: the shape every ShapeDefinition record conforms to.

use crate::shape::{ObjectShape, Shape};

/// Field holding a ShapeDefinition's registry name.
pub const NAME_FIELD: &str = "name";
/// Field holding a ShapeDefinition's serialized description.
pub const DEFINITION_FIELD: &str = "definition";

/// The meta-shape description. It has no nested objects, so compiling it
/// never extracts anything.
#[must_use]
pub fn meta_shape() -> ObjectShape {
    ObjectShape::new()
        .required(NAME_FIELD, Shape::string())
        .required(DEFINITION_FIELD, Shape::json())
}
