//! Shapes and the schema registry for covalent.
//!
//! Applications describe entity shapes as data. This crate:
//! - compiles a description into a flat set of linked definitions
//!   ([`compile`]), one per inline object
//! - stores each definition once, as a record conforming to the meta-shape
//!   ([`SchemaRegistry`])
//! - validates record data against a stored definition ([`RecordShape`])
//!
//! Where definitions are indexed is abstracted by [`ShapeCatalog`], so the
//! same registry serves the bootstrap staging area and the permanent index.

mod catalog;
mod compiler;
mod error;
mod in_flight;
mod meta;
mod record_shape;
mod registry;
mod shape;

pub use catalog::{MapCatalog, ShapeCatalog, StoreCatalog};
pub use compiler::{compile, CompiledShape, ExtractedShape, ITEMS_SEGMENT};
pub use error::{SchemaError, SchemaResult};
pub use in_flight::InFlightShapes;
pub use meta::{meta_shape, DEFINITION_FIELD, NAME_FIELD};
pub use record_shape::RecordShape;
pub use registry::{SchemaRegistry, ShapeHandle};
pub use shape::{
    is_system_field, FieldDef, ObjectShape, ScalarType, Shape, ShapeRef, LABEL_FIELD,
    META_SHAPE_NAME, SCHEMA_FIELD,
};
