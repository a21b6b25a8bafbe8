//! The store interface consumed by the schema engine.

use crate::error::StoreResult;
use crate::group::{Group, Role};
use crate::record::Record;
use async_trait::async_trait;
use covalent_types::{AccountId, GroupId, RecordId};
use serde_json::{Map, Value};
use std::time::Duration;

/// A replicated, permissioned record store acting as one account.
///
/// Every call may suspend. Implementations must be safe to share across
/// tasks; the engine holds them as `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The account all writes are attributed to.
    fn account_id(&self) -> AccountId;

    /// The account's private root map. Created on first access.
    async fn account_root(&self) -> StoreResult<RecordId>;

    // ── Groups ───────────────────────────────────────────────────

    /// Creates a group administered by the acting account.
    async fn create_group(&self) -> StoreResult<GroupId>;

    /// Makes `child` inherit every role granted on `parent`.
    async fn extend_group(&self, child: GroupId, parent: GroupId) -> StoreResult<()>;

    /// Creates a group that extends `parent`.
    async fn create_group_extending(&self, parent: GroupId) -> StoreResult<GroupId> {
        let group = self.create_group().await?;
        self.extend_group(group, parent).await?;
        Ok(group)
    }

    /// Grants (or with `None`, revokes) a role to everyone.
    async fn set_public_role(&self, group: GroupId, role: Option<Role>) -> StoreResult<()>;

    async fn add_member(&self, group: GroupId, account: AccountId, role: Role) -> StoreResult<()>;

    async fn remove_member(&self, group: GroupId, account: AccountId) -> StoreResult<()>;

    async fn load_group(&self, group: GroupId) -> StoreResult<Group>;

    // ── Records ──────────────────────────────────────────────────

    async fn create_map(&self, fields: Map<String, Value>, owner: GroupId) -> StoreResult<RecordId>;

    async fn create_list(&self, items: Vec<Value>, owner: GroupId) -> StoreResult<RecordId>;

    async fn create_stream(&self, owner: GroupId) -> StoreResult<RecordId>;

    async fn load(&self, id: RecordId) -> StoreResult<Record>;

    // ── Mutations ────────────────────────────────────────────────

    async fn set_field(&self, id: RecordId, key: &str, value: Value) -> StoreResult<()>;

    async fn delete_field(&self, id: RecordId, key: &str) -> StoreResult<()>;

    async fn list_push(&self, id: RecordId, value: Value) -> StoreResult<()>;

    /// Removes the item at a visible position and returns it.
    async fn list_remove(&self, id: RecordId, index: usize) -> StoreResult<Value>;

    async fn stream_push(&self, id: RecordId, value: Value) -> StoreResult<()>;

    // ── Durability ───────────────────────────────────────────────

    /// Resolves once every record in `ids` is durably persisted.
    async fn confirm_persisted(&self, ids: &[RecordId], timeout: Duration) -> StoreResult<()>;
}
