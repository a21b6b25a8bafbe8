//! Append-only feed backing stream records.
//!
//! Every account appends to its own log, so concurrent writers never
//! conflict. Reading interleaves all logs by timestamp.

use covalent_types::{AccountId, HybridTimestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry<T> {
    pub author: AccountId,
    pub timestamp: HybridTimestamp,
    pub value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed<T> {
    logs: BTreeMap<AccountId, Vec<FeedEntry<T>>>,
}

impl<T: Clone> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Feed<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs: BTreeMap::new(),
        }
    }

    /// Appends to `author`'s log and returns the entry's timestamp.
    pub fn push(&mut self, value: T, author: AccountId) -> HybridTimestamp {
        let log = self.logs.entry(author).or_default();
        let timestamp = log
            .last()
            .map(|entry| entry.timestamp.tick())
            .unwrap_or_else(HybridTimestamp::now);
        log.push(FeedEntry {
            author,
            timestamp,
            value,
        });
        timestamp
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries across accounts, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<&FeedEntry<T>> {
        let mut all: Vec<&FeedEntry<T>> = self.logs.values().flatten().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.author.cmp(&b.author)));
        all
    }

    /// The most recent entry by timestamp.
    #[must_use]
    pub fn latest(&self) -> Option<&FeedEntry<T>> {
        self.entries().last().copied()
    }

    /// One author's log, in append order.
    #[must_use]
    pub fn log(&self, author: &AccountId) -> &[FeedEntry<T>] {
        self.logs.get(author).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unions every author's log, deduplicating by timestamp.
    pub fn merge(&mut self, other: &Self) {
        for (author, theirs) in &other.logs {
            let ours = self.logs.entry(*author).or_default();
            for entry in theirs {
                if let Err(pos) = ours.binary_search_by(|e| e.timestamp.cmp(&entry.timestamp)) {
                    ours.insert(pos, entry.clone());
                }
            }
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}
