//! Error types for the schema layer.

use covalent_store::StoreError;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur compiling, registering or validating shapes.
///
/// `Clone` because a single in-flight creation delivers its outcome to
/// every caller waiting on the same shape name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A top-level description was not an object shape.
    #[error("top-level shape must be an object, got {0}")]
    NotAnObject(&'static str),

    /// No shape is registered under this name.
    #[error("shape not found: {0}")]
    NotFound(String),

    /// A reference points at nothing loadable.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Data does not satisfy a shape.
    #[error("invalid value for {shape}.{field}: {reason}")]
    Validation {
        shape: String,
        field: String,
        reason: String,
    },

    /// A stored definition could not be decoded.
    #[error("corrupt shape definition: {0}")]
    Corrupt(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
