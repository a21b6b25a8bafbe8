//! Permission groups.
//!
//! A group grants roles to accounts directly, to everyone through a public
//! role, and to the members of every group it extends. Extension inherits
//! all roles of the parent, so an admin of the parent administers the child.

use covalent_types::{AccountId, GroupId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Access level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub created_by: AccountId,
    members: BTreeMap<AccountId, Role>,
    parents: BTreeSet<GroupId>,
    public: Option<Role>,
}

impl Group {
    /// A new group whose creator is its only (admin) member.
    #[must_use]
    pub fn new(id: GroupId, creator: AccountId) -> Self {
        let mut members = BTreeMap::new();
        members.insert(creator, Role::Admin);
        Self {
            id,
            created_by: creator,
            members,
            parents: BTreeSet::new(),
            public: None,
        }
    }

    /// Direct membership only; see [`effective_role`] for inherited access.
    #[must_use]
    pub fn member_role(&self, account: &AccountId) -> Option<Role> {
        self.members.get(account).copied()
    }

    #[must_use]
    pub fn is_member(&self, account: &AccountId) -> bool {
        self.members.contains_key(account)
    }

    pub fn members(&self) -> impl Iterator<Item = (&AccountId, &Role)> {
        self.members.iter()
    }

    pub fn parents(&self) -> impl Iterator<Item = &GroupId> {
        self.parents.iter()
    }

    #[must_use]
    pub fn extends(&self, parent: &GroupId) -> bool {
        self.parents.contains(parent)
    }

    #[must_use]
    pub fn public_role(&self) -> Option<Role> {
        self.public
    }

    pub(crate) fn set_member(&mut self, account: AccountId, role: Role) {
        self.members.insert(account, role);
    }

    pub(crate) fn remove_member(&mut self, account: &AccountId) -> bool {
        self.members.remove(account).is_some()
    }

    pub(crate) fn add_parent(&mut self, parent: GroupId) {
        self.parents.insert(parent);
    }

    pub(crate) fn set_public(&mut self, role: Option<Role>) {
        self.public = role;
    }
}

/// The strongest role `account` holds on `group`, walking extended parents.
///
/// Cycles in the extension graph are tolerated; each group is visited once.
#[must_use]
pub fn effective_role(
    groups: &HashMap<GroupId, Group>,
    group: &GroupId,
    account: &AccountId,
) -> Option<Role> {
    let mut visited = HashSet::new();
    let mut stack = vec![*group];
    let mut best: Option<Role> = None;

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let Some(g) = groups.get(&current) else {
            continue;
        };
        for role in [g.member_role(account), g.public_role()].into_iter().flatten() {
            best = Some(best.map_or(role, |b| b.max(role)));
        }
        stack.extend(g.parents());
    }

    best
}
