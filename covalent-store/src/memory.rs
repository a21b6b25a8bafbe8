//! In-process record store.
//!
//! State is shared behind an `Arc<RwLock<..>>`, so [`MemoryStore::connect_as`]
//! can hand out handles for other accounts over the same records. Writes are
//! persisted immediately unless persistence is paused, which lets callers
//! observe how code behaves while a sync backlog is outstanding.

use crate::error::{StoreError, StoreResult};
use crate::group::{effective_role, Group, Role};
use crate::record::{MapRecord, Record, RecordBody, RecordHeader, RecordKind};
use crate::store::RecordStore;
use async_trait::async_trait;
use covalent_crdt::{Feed, Sequence};
use covalent_types::{AccountId, GroupId, HybridTimestamp, RecordId};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

#[derive(Default, Clone)]
struct StoreState {
    records: HashMap<RecordId, Record>,
    groups: HashMap<GroupId, Group>,
    roots: HashMap<AccountId, RecordId>,
    /// Records written while persistence was paused.
    unpersisted: HashSet<RecordId>,
    persistence_paused: bool,
}

impl StoreState {
    fn require(&self, account: AccountId, group: GroupId, needed: Role) -> StoreResult<()> {
        if !self.groups.contains_key(&group) {
            return Err(StoreError::GroupNotFound(group));
        }
        match effective_role(&self.groups, &group, &account) {
            Some(role) if role >= needed => Ok(()),
            _ => Err(StoreError::PermissionDenied {
                account,
                group,
                needed,
            }),
        }
    }

    fn touch(&mut self, id: RecordId) {
        if self.persistence_paused {
            self.unpersisted.insert(id);
        }
    }

    fn insert_record(&mut self, account: AccountId, owner: GroupId, body: RecordBody) -> RecordId {
        let id = RecordId::new();
        let header = RecordHeader {
            id,
            kind: body.kind(),
            owner,
            created_by: account,
            created_at: HybridTimestamp::now(),
        };
        self.records.insert(id, Record { header, body });
        self.touch(id);
        id
    }

    /// Checks write access and returns the record for mutation.
    fn writable(&mut self, account: AccountId, id: RecordId) -> StoreResult<&mut Record> {
        let owner = self
            .records
            .get(&id)
            .map(Record::owner)
            .ok_or(StoreError::NotFound(id))?;
        self.require(account, owner, Role::Writer)?;
        self.touch(id);
        self.records.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn group_mut(&mut self, account: AccountId, group: GroupId) -> StoreResult<&mut Group> {
        self.require(account, group, Role::Admin)?;
        self.groups
            .get_mut(&group)
            .ok_or(StoreError::GroupNotFound(group))
    }
}

fn wrong_kind(id: RecordId, actual: RecordKind, expected: RecordKind) -> StoreError {
    StoreError::WrongKind {
        id,
        expected,
        actual,
    }
}

/// An in-memory [`RecordStore`] acting as one account.
#[derive(Clone)]
pub struct MemoryStore {
    account: AccountId,
    state: Arc<RwLock<StoreState>>,
    persisted: Arc<Notify>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store acting as a fresh account.
    #[must_use]
    pub fn new() -> Self {
        Self {
            account: AccountId::new(),
            state: Arc::new(RwLock::new(StoreState::default())),
            persisted: Arc::new(Notify::new()),
        }
    }

    /// Another handle over the same records, acting as `account`.
    #[must_use]
    pub fn connect_as(&self, account: AccountId) -> Self {
        Self {
            account,
            state: Arc::clone(&self.state),
            persisted: Arc::clone(&self.persisted),
        }
    }

    /// Holds back persistence of every write from now on.
    pub async fn pause_persistence(&self) {
        self.state.write().await.persistence_paused = true;
    }

    /// Persists the backlog and wakes anyone waiting on it.
    pub async fn resume_persistence(&self) {
        {
            let mut state = self.state.write().await;
            state.persistence_paused = false;
            state.unpersisted.clear();
        }
        self.persisted.notify_waiters();
    }

    /// An independent replica holding a copy of every record and group.
    ///
    /// Writes to either side stay local until [`MemoryStore::merge_from`]
    /// exchanges them. Replicas written concurrently must act as distinct
    /// accounts (see [`MemoryStore::connect_as`]).
    pub async fn fork(&self) -> Self {
        let mut state = self.state.read().await.clone();
        state.unpersisted.clear();
        state.persistence_paused = false;
        Self {
            account: self.account,
            state: Arc::new(RwLock::new(state)),
            persisted: Arc::new(Notify::new()),
        }
    }

    /// Folds every record and group of `other` into this replica.
    ///
    /// Records present on both sides are merged field by field (maps),
    /// item by item (lists) and per account log (streams). Records and
    /// groups only `other` knows are copied. Returns how many records were
    /// added or merged.
    pub async fn merge_from(&self, other: &MemoryStore) -> usize {
        let theirs = other.state.read().await.clone();
        let mut state = self.state.write().await;
        let mut merged = 0;

        for (id, group) in theirs.groups {
            state.groups.entry(id).or_insert(group);
        }
        for (account, root) in theirs.roots {
            state.roots.entry(account).or_insert(root);
        }
        for (id, record) in theirs.records {
            let changed = match state.records.get_mut(&id) {
                Some(ours) => {
                    let ok = ours.body.merge(&record.body);
                    if !ok {
                        warn!(
                            "Skipping merge of {}: kind {:?} against {:?}",
                            id,
                            ours.kind(),
                            record.kind()
                        );
                    }
                    ok
                }
                None => {
                    state.records.insert(id, record);
                    true
                }
            };
            if changed {
                state.touch(id);
                merged += 1;
            }
        }
        debug!("Merged {} records from replica", merged);
        merged
    }

    /// Total number of records across all accounts.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Ids of every map record whose `key` equals `value`, ignoring
    /// permissions. Meant for assertions and diagnostics.
    pub async fn maps_with_field(&self, key: &str, value: &Value) -> Vec<RecordId> {
        let state = self.state.read().await;
        let mut ids: Vec<RecordId> = state
            .records
            .values()
            .filter(|record| record.field(key) == Some(value))
            .map(Record::id)
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn account_id(&self) -> AccountId {
        self.account
    }

    async fn account_root(&self) -> StoreResult<RecordId> {
        let mut state = self.state.write().await;
        if let Some(root) = state.roots.get(&self.account) {
            return Ok(*root);
        }
        let group = GroupId::new();
        state.groups.insert(group, Group::new(group, self.account));
        let root = state.insert_record(self.account, group, RecordBody::Map(MapRecord::default()));
        state.roots.insert(self.account, root);
        debug!("Created account root {} for {}", root, self.account);
        Ok(root)
    }

    async fn create_group(&self) -> StoreResult<GroupId> {
        let id = GroupId::new();
        self.state
            .write()
            .await
            .groups
            .insert(id, Group::new(id, self.account));
        debug!("Created group {}", id);
        Ok(id)
    }

    async fn extend_group(&self, child: GroupId, parent: GroupId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&parent) {
            return Err(StoreError::GroupNotFound(parent));
        }
        state.group_mut(self.account, child)?.add_parent(parent);
        debug!("Group {} now extends {}", child, parent);
        Ok(())
    }

    async fn set_public_role(&self, group: GroupId, role: Option<Role>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.group_mut(self.account, group)?.set_public(role);
        Ok(())
    }

    async fn add_member(&self, group: GroupId, account: AccountId, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.group_mut(self.account, group)?.set_member(account, role);
        Ok(())
    }

    async fn remove_member(&self, group: GroupId, account: AccountId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.group_mut(self.account, group)?.remove_member(&account) {
            warn!("Account {} was not a direct member of group {}", account, group);
        }
        Ok(())
    }

    async fn load_group(&self, group: GroupId) -> StoreResult<Group> {
        self.state
            .read()
            .await
            .groups
            .get(&group)
            .cloned()
            .ok_or(StoreError::GroupNotFound(group))
    }

    async fn create_map(
        &self,
        fields: Map<String, Value>,
        owner: GroupId,
    ) -> StoreResult<RecordId> {
        let mut state = self.state.write().await;
        state.require(self.account, owner, Role::Writer)?;
        let body = RecordBody::Map(MapRecord::from_fields(fields, self.account));
        Ok(state.insert_record(self.account, owner, body))
    }

    async fn create_list(&self, items: Vec<Value>, owner: GroupId) -> StoreResult<RecordId> {
        let mut state = self.state.write().await;
        state.require(self.account, owner, Role::Writer)?;
        let body = RecordBody::List(Sequence::from_values(items, self.account));
        Ok(state.insert_record(self.account, owner, body))
    }

    async fn create_stream(&self, owner: GroupId) -> StoreResult<RecordId> {
        let mut state = self.state.write().await;
        state.require(self.account, owner, Role::Writer)?;
        Ok(state.insert_record(self.account, owner, RecordBody::Stream(Feed::new())))
    }

    async fn load(&self, id: RecordId) -> StoreResult<Record> {
        let state = self.state.read().await;
        let record = state.records.get(&id).ok_or(StoreError::NotFound(id))?;
        state.require(self.account, record.owner(), Role::Reader)?;
        Ok(record.clone())
    }

    async fn set_field(&self, id: RecordId, key: &str, value: Value) -> StoreResult<()> {
        let account = self.account;
        let mut state = self.state.write().await;
        let record = state.writable(account, id)?;
        let actual = record.kind();
        match &mut record.body {
            RecordBody::Map(map) => {
                map.set(key, value, account);
                Ok(())
            }
            _ => Err(wrong_kind(id, actual, RecordKind::Map)),
        }
    }

    async fn delete_field(&self, id: RecordId, key: &str) -> StoreResult<()> {
        let account = self.account;
        let mut state = self.state.write().await;
        let record = state.writable(account, id)?;
        let actual = record.kind();
        match &mut record.body {
            RecordBody::Map(map) => {
                map.delete(key, account);
                Ok(())
            }
            _ => Err(wrong_kind(id, actual, RecordKind::Map)),
        }
    }

    async fn list_push(&self, id: RecordId, value: Value) -> StoreResult<()> {
        let account = self.account;
        let mut state = self.state.write().await;
        let record = state.writable(account, id)?;
        let actual = record.kind();
        match &mut record.body {
            RecordBody::List(list) => {
                list.push(value, account);
                Ok(())
            }
            _ => Err(wrong_kind(id, actual, RecordKind::List)),
        }
    }

    async fn list_remove(&self, id: RecordId, index: usize) -> StoreResult<Value> {
        let account = self.account;
        let mut state = self.state.write().await;
        let record = state.writable(account, id)?;
        let actual = record.kind();
        match &mut record.body {
            RecordBody::List(list) => {
                let len = list.len();
                list.remove(index)
                    .ok_or(StoreError::IndexOutOfBounds { id, index, len })
            }
            _ => Err(wrong_kind(id, actual, RecordKind::List)),
        }
    }

    async fn stream_push(&self, id: RecordId, value: Value) -> StoreResult<()> {
        let account = self.account;
        let mut state = self.state.write().await;
        let record = state.writable(account, id)?;
        let actual = record.kind();
        match &mut record.body {
            RecordBody::Stream(feed) => {
                feed.push(value, account);
                Ok(())
            }
            _ => Err(wrong_kind(id, actual, RecordKind::Stream)),
        }
    }

    async fn confirm_persisted(&self, ids: &[RecordId], timeout: Duration) -> StoreResult<()> {
        let wait = async {
            loop {
                let notified = self.persisted.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                {
                    let state = self.state.read().await;
                    if let Some(missing) = ids.iter().find(|id| !state.records.contains_key(*id)) {
                        return Err(StoreError::NotFound(*missing));
                    }
                    if ids.iter().all(|id| !state.unpersisted.contains(id)) {
                        return Ok(());
                    }
                }

                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                let state = self.state.read().await;
                let pending = ids.iter().filter(|id| state.unpersisted.contains(*id)).count();
                Err(StoreError::Timeout {
                    pending,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}
