//! Error types for the store layer.

use crate::group::Role;
use crate::record::RecordKind;
use covalent_types::{AccountId, GroupId, RecordId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// `Clone` so one failure can be handed to every task awaiting it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No record with this id is available.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// No group with this id is available.
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    /// The record exists but is not the kind the operation needs.
    #[error("record {id} is a {actual:?} record, expected {expected:?}")]
    WrongKind {
        id: RecordId,
        expected: RecordKind,
        actual: RecordKind,
    },

    /// The acting account lacks the role the operation needs.
    #[error("account {account} lacks {needed:?} on group {group}")]
    PermissionDenied {
        account: AccountId,
        group: GroupId,
        needed: Role,
    },

    /// List position outside the visible items.
    #[error("index {index} out of bounds for list {id} of length {len}")]
    IndexOutOfBounds { id: RecordId, index: usize, len: usize },

    /// Durable persistence was not confirmed in time.
    #[error("persistence not confirmed for {pending} record(s) within {timeout_ms}ms")]
    Timeout { pending: usize, timeout_ms: u64 },
}
