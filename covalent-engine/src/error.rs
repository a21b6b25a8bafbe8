//! Error types for the engine.

use covalent_schema::SchemaError;
use covalent_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to application code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A shape, entity or registry is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entity has no loadable shape reference.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Data does not satisfy the entity's shape.
    #[error("invalid value for {shape}.{field}: {reason}")]
    Validation {
        shape: String,
        field: String,
        reason: String,
    },

    /// Bootstrap could not confirm durable persistence in time. The store
    /// must not be used until the cause is resolved.
    #[error("bootstrap persistence not confirmed: {0}")]
    PersistenceTimeout(String),

    /// The group that should own a new record could not be determined.
    #[error("cannot determine owner: {0}")]
    OwnerResolution(String),

    /// The account has no root tenant yet.
    #[error("store is not bootstrapped")]
    NotBootstrapped,

    /// Built-in shapes reference each other in a cycle.
    #[error("dependency cycle among shapes: {0:?}")]
    DependencyCycle(Vec<String>),

    /// Other schema error.
    #[error("schema error: {0}")]
    Schema(SchemaError),

    /// Other store error.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::NotFound(name) => Self::NotFound(name),
            SchemaError::UnresolvedReference(what) => Self::UnresolvedReference(what),
            SchemaError::Validation {
                shape,
                field,
                reason,
            } => Self::Validation {
                shape,
                field,
                reason,
            },
            SchemaError::Store(store) => store.into(),
            other => Self::Schema(other),
        }
    }
}
