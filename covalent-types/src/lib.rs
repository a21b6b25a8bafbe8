//! Shared type definitions for covalent.
//!
//! Everything above the record store speaks in terms of these types:
//! - Record, group and account identifiers (UUID v7)
//! - Hybrid Logical Clock timestamps used to order CRDT writes
//!
//! Shape descriptions, entities and registries live in the higher crates.

mod ids;
mod timestamp;

pub use ids::{AccountId, GroupId, RecordId};
pub use timestamp::HybridTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when decoding shared types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("expected a record reference, got {0}")]
    NotAReference(String),
}

/// Reads a record reference out of a JSON value.
///
/// References are stored as the referenced record's id rendered as a string.
pub fn reference_from_value(value: &serde_json::Value) -> Result<RecordId> {
    match value.as_str() {
        Some(s) => Ok(RecordId::parse(s)?),
        None => Err(Error::NotAReference(value.to_string())),
    }
}
