//! Replicated sequence (RGA) backing list records.
//!
//! Each item remembers the item it was inserted after. The visible order is
//! rebuilt from those origins: siblings sharing an origin are ordered newest
//! first, then the tree is walked depth first. Removal leaves a tombstone so
//! a concurrent insert after a removed item still has an anchor.

use covalent_types::{AccountId, HybridTimestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Globally unique, totally ordered identity of one inserted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub timestamp: HybridTimestamp,
    pub author: AccountId,
    pub seq: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item<T> {
    id: ItemId,
    /// `None` means inserted at the head.
    after: Option<ItemId>,
    /// `None` once removed.
    value: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence<T> {
    items: Vec<Item<T>>,
    clock: HybridTimestamp,
    seq: u32,
}

impl<T: Clone> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Sequence<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            clock: HybridTimestamp::zero(),
            seq: 0,
        }
    }

    /// Builds a sequence from initial values, all authored by `author`.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = T>, author: AccountId) -> Self {
        let mut seq = Self::new();
        for value in values {
            seq.push(value, author);
        }
        seq
    }

    /// Item ids in document order, tombstones included.
    fn order(&self) -> Vec<ItemId> {
        let mut children: BTreeMap<Option<ItemId>, BTreeSet<ItemId>> = BTreeMap::new();
        for item in &self.items {
            children.entry(item.after).or_default().insert(item.id);
        }

        let mut order = Vec::with_capacity(self.items.len());
        let mut stack: Vec<ItemId> = children
            .get(&None)
            .map(|kids| kids.iter().copied().collect())
            .unwrap_or_default();
        // Stack pops from the end, so ascending ids yield newest-first siblings.
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(kids) = children.get(&Some(current)) {
                stack.extend(kids.iter().copied());
            }
        }
        order
    }

    fn item(&self, id: &ItemId) -> Option<&Item<T>> {
        self.items.iter().find(|item| item.id == *id)
    }

    fn visible_ids(&self) -> Vec<ItemId> {
        self.order()
            .into_iter()
            .filter(|id| self.item(id).is_some_and(|item| item.value.is_some()))
            .collect()
    }

    fn next_id(&mut self, author: AccountId) -> ItemId {
        self.clock = self.clock.tick();
        self.seq = self.seq.wrapping_add(1);
        ItemId {
            timestamp: self.clock,
            author,
            seq: self.seq,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.iter().filter(|item| item.value.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible values in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.order()
            .iter()
            .filter_map(|id| self.item(id).and_then(|item| item.value.clone()))
            .collect()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        let id = self.visible_ids().get(index).copied()?;
        self.item(&id).and_then(|item| item.value.clone())
    }

    /// Inserts at a visible position. Indexes past the end append.
    pub fn insert(&mut self, index: usize, value: T, author: AccountId) -> ItemId {
        let visible = self.visible_ids();
        let after = match index {
            0 => None,
            i => visible.get(i - 1).or(visible.last()).copied(),
        };
        let id = self.next_id(author);
        self.items.push(Item {
            id,
            after,
            value: Some(value),
        });
        id
    }

    /// Appends after the last item in document order.
    pub fn push(&mut self, value: T, author: AccountId) -> ItemId {
        let after = self.order().last().copied();
        let id = self.next_id(author);
        self.items.push(Item {
            id,
            after,
            value: Some(value),
        });
        id
    }

    /// Removes the item at a visible position, returning its value.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let id = self.visible_ids().get(index).copied()?;
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.value.take()
    }

    /// Removes every visible item.
    pub fn clear(&mut self) -> usize {
        let mut removed = 0;
        for item in &mut self.items {
            if item.value.take().is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Merges another replica. Removals win over the same item's insert.
    pub fn merge(&mut self, other: &Self) {
        self.clock = self.clock.max(other.clock);
        for theirs in &other.items {
            match self.items.iter_mut().find(|item| item.id == theirs.id) {
                Some(ours) => {
                    if theirs.value.is_none() {
                        ours.value = None;
                    }
                }
                None => self.items.push(theirs.clone()),
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

impl<T: Clone + PartialEq> Sequence<T> {
    /// Visible position of the first item equal to `value`.
    #[must_use]
    pub fn position(&self, value: &T) -> Option<usize> {
        self.to_vec().iter().position(|v| v == value)
    }
}
