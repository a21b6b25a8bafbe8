//! Map-field register.
//!
//! A map record keeps one register per key. Each register carries the
//! [`Stamp`] of the write that produced its value; replicas keep whichever
//! value has the greater stamp.

use covalent_types::{AccountId, HybridTimestamp};
use serde::{Deserialize, Serialize};

/// Identity of a single write: when it happened and who made it.
///
/// Ordered by timestamp, then by writer, so two replicas holding
/// different writes with equal timestamps still agree on a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub timestamp: HybridTimestamp,
    pub writer: AccountId,
}

impl Stamp {
    #[must_use]
    pub fn new(timestamp: HybridTimestamp, writer: AccountId) -> Self {
        Self { timestamp, writer }
    }

    /// A stamp for a fresh write by `writer`.
    #[must_use]
    pub fn now(writer: AccountId) -> Self {
        Self::new(HybridTimestamp::now(), writer)
    }

    /// The stamp for a write by `writer` replacing this one. Always greater.
    #[must_use]
    pub fn next(&self, writer: AccountId) -> Self {
        Self::new(self.timestamp.tick(), writer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    value: T,
    stamp: Stamp,
}

impl<T> LwwRegister<T> {
    #[must_use]
    pub fn new(value: T, writer: AccountId) -> Self {
        Self::stamped(value, Stamp::now(writer))
    }

    #[must_use]
    pub fn stamped(value: T, stamp: Stamp) -> Self {
        Self { value, stamp }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    #[must_use]
    pub fn timestamp(&self) -> HybridTimestamp {
        self.stamp.timestamp
    }

    #[must_use]
    pub fn writer(&self) -> AccountId {
        self.stamp.writer
    }

    /// A local write. It supersedes the current value on every replica
    /// that has seen it.
    pub fn set(&mut self, value: T, writer: AccountId) {
        self.stamp = self.stamp.next(writer);
        self.value = value;
    }
}

impl<T: Clone> LwwRegister<T> {
    /// Takes `other`'s value if its stamp is greater. Returns true if the
    /// value changed.
    pub fn merge(&mut self, other: &Self) -> bool {
        if other.stamp <= self.stamp {
            return false;
        }
        self.value = other.value.clone();
        self.stamp = other.stamp;
        true
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}
