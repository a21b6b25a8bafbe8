use covalent_store::{effective_role, Group, Role};
use covalent_types::{AccountId, GroupId};
use std::collections::HashMap;

#[test]
fn creator_is_admin() {
    let creator = AccountId::new();
    let group = Group::new(GroupId::new(), creator);
    assert_eq!(group.member_role(&creator), Some(Role::Admin));
    assert_eq!(group.members().count(), 1);
    assert_eq!(group.public_role(), None);
}

#[test]
fn role_ordering() {
    assert!(Role::Reader < Role::Writer);
    assert!(Role::Writer < Role::Admin);
}

#[test]
fn effective_role_of_stranger_is_none() {
    let creator = AccountId::new();
    let id = GroupId::new();
    let groups = HashMap::from([(id, Group::new(id, creator))]);
    assert_eq!(effective_role(&groups, &id, &AccountId::new()), None);
    assert_eq!(effective_role(&groups, &id, &creator), Some(Role::Admin));
}

#[test]
fn effective_role_of_unknown_group_is_none() {
    let groups = HashMap::new();
    assert_eq!(effective_role(&groups, &GroupId::new(), &AccountId::new()), None);
}
