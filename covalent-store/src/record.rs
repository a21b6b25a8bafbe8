//! Record snapshots returned by the store.

use crate::error::{StoreError, StoreResult};
use covalent_crdt::{Feed, LwwRegister, Sequence};
use covalent_types::{AccountId, GroupId, HybridTimestamp, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Map,
    List,
    Stream,
}

/// Immutable facts about a record, fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: RecordId,
    pub kind: RecordKind,
    pub owner: GroupId,
    pub created_by: AccountId,
    pub created_at: HybridTimestamp,
}

/// A map record: one last-writer-wins register per key.
///
/// Deleting a key stores a `None` tombstone so the deletion itself merges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapRecord {
    fields: BTreeMap<String, LwwRegister<Option<Value>>>,
}

impl MapRecord {
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>, writer: AccountId) -> Self {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key, LwwRegister::new(Some(value), writer)))
            .collect();
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).and_then(|reg| reg.value().as_ref())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: Value, writer: AccountId) {
        match self.fields.get_mut(key) {
            Some(reg) => reg.set(Some(value), writer),
            None => {
                self.fields
                    .insert(key.to_string(), LwwRegister::new(Some(value), writer));
            }
        }
    }

    /// Returns true if the key held a value.
    pub fn delete(&mut self, key: &str, writer: AccountId) -> bool {
        match self.fields.get_mut(key) {
            Some(reg) if reg.value().is_some() => {
                reg.set(None, writer);
                true
            }
            _ => false,
        }
    }

    /// Live keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, reg)| reg.value().is_some())
            .map(|(key, _)| key.as_str())
    }

    /// Live fields as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(key, reg)| reg.value().clone().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Timestamp of the most recent write to any key.
    #[must_use]
    pub fn modified_at(&self) -> Option<HybridTimestamp> {
        self.fields.values().map(LwwRegister::timestamp).max()
    }

    pub fn merge(&mut self, other: &Self) {
        for (key, theirs) in &other.fields {
            match self.fields.get_mut(key) {
                Some(ours) => {
                    ours.merge(theirs);
                }
                None => {
                    self.fields.insert(key.clone(), theirs.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordBody {
    Map(MapRecord),
    List(Sequence<Value>),
    Stream(Feed<Value>),
}

impl RecordBody {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Map(_) => RecordKind::Map,
            Self::List(_) => RecordKind::List,
            Self::Stream(_) => RecordKind::Stream,
        }
    }

    /// Folds another replica's copy of the same record into this one.
    pub(crate) fn merge(&mut self, other: &Self) -> bool {
        match (self, other) {
            (Self::Map(ours), Self::Map(theirs)) => ours.merge(theirs),
            (Self::List(ours), Self::List(theirs)) => ours.merge(theirs),
            (Self::Stream(ours), Self::Stream(theirs)) => ours.merge(theirs),
            _ => return false,
        }
        true
    }
}

/// A point-in-time copy of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub header: RecordHeader,
    pub body: RecordBody,
}

impl Record {
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.header.id
    }

    #[must_use]
    pub fn owner(&self) -> GroupId {
        self.header.owner
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.header.kind
    }

    fn wrong_kind(&self, expected: RecordKind) -> StoreError {
        StoreError::WrongKind {
            id: self.header.id,
            expected,
            actual: self.header.kind,
        }
    }

    pub fn as_map(&self) -> StoreResult<&MapRecord> {
        match &self.body {
            RecordBody::Map(map) => Ok(map),
            _ => Err(self.wrong_kind(RecordKind::Map)),
        }
    }

    pub fn as_list(&self) -> StoreResult<&Sequence<Value>> {
        match &self.body {
            RecordBody::List(list) => Ok(list),
            _ => Err(self.wrong_kind(RecordKind::List)),
        }
    }

    pub fn as_stream(&self) -> StoreResult<&Feed<Value>> {
        match &self.body {
            RecordBody::Stream(feed) => Ok(feed),
            _ => Err(self.wrong_kind(RecordKind::Stream)),
        }
    }

    /// A map field, or `None` for missing keys and non-map records.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        match &self.body {
            RecordBody::Map(map) => map.get(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// A map field read as a record reference.
    #[must_use]
    pub fn reference(&self, key: &str) -> Option<RecordId> {
        self.str_field(key).and_then(|s| RecordId::parse(s).ok())
    }

    /// Values of a list or stream record in order; empty for maps.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        match &self.body {
            RecordBody::Map(_) => Vec::new(),
            RecordBody::List(list) => list.to_vec(),
            RecordBody::Stream(feed) => {
                feed.entries().into_iter().map(|e| e.value.clone()).collect()
            }
        }
    }

    #[must_use]
    pub fn modified_at(&self) -> HybridTimestamp {
        match &self.body {
            RecordBody::Map(map) => map.modified_at().unwrap_or(self.header.created_at),
            RecordBody::Stream(feed) => feed
                .latest()
                .map_or(self.header.created_at, |e| e.timestamp),
            RecordBody::List(_) => self.header.created_at,
        }
    }
}
