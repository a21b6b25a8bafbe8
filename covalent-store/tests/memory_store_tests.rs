use covalent_store::{MemoryStore, RecordKind, RecordStore, Role, StoreError};
use covalent_types::{AccountId, RecordId};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::time::Duration;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

// ── Account root ─────────────────────────────────────────────────

#[tokio::test]
async fn account_root_is_stable() {
    let store = MemoryStore::new();
    let a = store.account_root().await.unwrap();
    let b = store.account_root().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(store.load(a).await.unwrap().kind(), RecordKind::Map);
}

#[tokio::test]
async fn account_roots_are_per_account() {
    let store = MemoryStore::new();
    let other = store.connect_as(AccountId::new());
    assert_ne!(
        store.account_root().await.unwrap(),
        other.account_root().await.unwrap()
    );
}

// ── Map records ──────────────────────────────────────────────────

#[tokio::test]
async fn create_and_load_map() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store
        .create_map(fields(json!({"title": "Buy milk", "done": false})), group)
        .await
        .unwrap();

    let record = store.load(id).await.unwrap();
    assert_eq!(record.owner(), group);
    assert_eq!(record.header.created_by, store.account_id());
    assert_eq!(record.str_field("title"), Some("Buy milk"));
    assert_eq!(
        record.as_map().unwrap().to_json(),
        fields(json!({"title": "Buy milk", "done": false}))
    );
}

#[tokio::test]
async fn set_and_delete_field() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_map(Map::new(), group).await.unwrap();

    store.set_field(id, "a", json!(1)).await.unwrap();
    store.set_field(id, "a", json!(2)).await.unwrap();
    assert_eq!(store.load(id).await.unwrap().field("a"), Some(&json!(2)));

    store.delete_field(id, "a").await.unwrap();
    let record = store.load(id).await.unwrap();
    assert_eq!(record.field("a"), None);
    assert_eq!(record.as_map().unwrap().keys().count(), 0);
}

#[tokio::test]
async fn reference_field_parses_record_id() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let target = RecordId::new();
    let id = store
        .create_map(fields(json!({"link": target.to_string()})), group)
        .await
        .unwrap();
    assert_eq!(store.load(id).await.unwrap().reference("link"), Some(target));
}

#[tokio::test]
async fn load_missing_record() {
    let store = MemoryStore::new();
    let id = RecordId::new();
    assert_eq!(store.load(id).await.unwrap_err(), StoreError::NotFound(id));
}

// ── Lists and streams ────────────────────────────────────────────

#[tokio::test]
async fn list_push_and_remove() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_list(vec![json!("a")], group).await.unwrap();

    store.list_push(id, json!("b")).await.unwrap();
    store.list_push(id, json!("c")).await.unwrap();
    assert_eq!(store.list_remove(id, 1).await.unwrap(), json!("b"));
    assert_eq!(store.load(id).await.unwrap().items(), vec![json!("a"), json!("c")]);
}

#[tokio::test]
async fn list_remove_out_of_bounds() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_list(vec![], group).await.unwrap();
    assert_eq!(
        store.list_remove(id, 0).await.unwrap_err(),
        StoreError::IndexOutOfBounds { id, index: 0, len: 0 }
    );
}

#[tokio::test]
async fn stream_push_appends() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_stream(group).await.unwrap();
    store.stream_push(id, json!({"body": "hi"})).await.unwrap();
    store.stream_push(id, json!({"body": "there"})).await.unwrap();

    let record = store.load(id).await.unwrap();
    assert_eq!(record.items(), vec![json!({"body": "hi"}), json!({"body": "there"})]);
}

#[tokio::test]
async fn mutation_on_wrong_kind_is_rejected() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let list = store.create_list(vec![], group).await.unwrap();
    let err = store.set_field(list, "a", json!(1)).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::WrongKind {
            id: list,
            expected: RecordKind::Map,
            actual: RecordKind::List
        }
    );
}

// ── Permissions ──────────────────────────────────────────────────

#[tokio::test]
async fn outsider_cannot_read_private_records() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_map(Map::new(), group).await.unwrap();

    let outsider = store.connect_as(AccountId::new());
    assert!(matches!(
        outsider.load(id).await,
        Err(StoreError::PermissionDenied { needed: Role::Reader, .. })
    ));
}

#[tokio::test]
async fn public_reader_can_read_but_not_write() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    store.set_public_role(group, Some(Role::Reader)).await.unwrap();
    let id = store.create_map(Map::new(), group).await.unwrap();

    let outsider = store.connect_as(AccountId::new());
    assert!(outsider.load(id).await.is_ok());
    assert!(matches!(
        outsider.set_field(id, "x", json!(1)).await,
        Err(StoreError::PermissionDenied { needed: Role::Writer, .. })
    ));
}

#[tokio::test]
async fn extended_group_inherits_parent_admins() {
    let store = MemoryStore::new();
    let parent = store.create_group().await.unwrap();
    let child = store.create_group_extending(parent).await.unwrap();

    // Dropping direct membership keeps access through the parent.
    store.remove_member(child, store.account_id()).await.unwrap();
    let group = store.load_group(child).await.unwrap();
    assert!(!group.is_member(&store.account_id()));
    assert!(group.extends(&parent));

    let id = store.create_map(Map::new(), child).await.unwrap();
    store.set_field(id, "still", json!(true)).await.unwrap();
}

#[tokio::test]
async fn added_writer_can_write() {
    let store = MemoryStore::new();
    let friend = AccountId::new();
    let group = store.create_group().await.unwrap();
    store.add_member(group, friend, Role::Writer).await.unwrap();
    let id = store.create_map(Map::new(), group).await.unwrap();

    let as_friend = store.connect_as(friend);
    as_friend.set_field(id, "by", json!("friend")).await.unwrap();
    assert!(as_friend.set_public_role(group, Some(Role::Reader)).await.is_err());
}

// ── Persistence ──────────────────────────────────────────────────

#[tokio::test]
async fn confirm_persisted_is_immediate_by_default() {
    let store = MemoryStore::new();
    let root = store.account_root().await.unwrap();
    store
        .confirm_persisted(&[root], Duration::from_millis(50))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn confirm_persisted_times_out_while_paused() {
    let store = MemoryStore::new();
    store.pause_persistence().await;
    let root = store.account_root().await.unwrap();

    let err = store
        .confirm_persisted(&[root], Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Timeout { pending: 1, timeout_ms: 100 });
}

#[tokio::test]
async fn confirm_persisted_wakes_on_resume() {
    let store = MemoryStore::new();
    store.pause_persistence().await;
    let root = store.account_root().await.unwrap();

    let waiter = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .confirm_persisted(&[root], Duration::from_secs(5))
                .await
        })
    };
    tokio::task::yield_now().await;
    store.resume_persistence().await;
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn confirm_persisted_unknown_record() {
    let store = MemoryStore::new();
    let id = RecordId::new();
    assert_eq!(
        store
            .confirm_persisted(&[id], Duration::from_millis(10))
            .await
            .unwrap_err(),
        StoreError::NotFound(id)
    );
}

#[tokio::test]
async fn maps_with_field_ignores_permissions() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store
        .create_map(fields(json!({"name": "Person"})), group)
        .await
        .unwrap();
    let other = store.connect_as(AccountId::new());
    assert_eq!(other.maps_with_field("name", &json!("Person")).await, vec![id]);
    assert_eq!(store.record_count().await, 1);
}

// ── Replicas ─────────────────────────────────────────────────────

#[tokio::test]
async fn forked_replicas_converge_after_merge() {
    let ada = MemoryStore::new();
    let bob_account = AccountId::new();
    let group = ada.create_group().await.unwrap();
    ada.add_member(group, bob_account, Role::Writer).await.unwrap();

    let task = ada
        .create_map(fields(json!({"title": "Plan", "done": false})), group)
        .await
        .unwrap();
    let tags = ada.create_list(vec![json!("a")], group).await.unwrap();
    let log = ada.create_stream(group).await.unwrap();

    let bob = ada.fork().await.connect_as(bob_account);

    ada.set_field(task, "title", json!("Plan A")).await.unwrap();
    bob.set_field(task, "done", json!(true)).await.unwrap();
    bob.set_field(task, "title", json!("Plan B")).await.unwrap();
    ada.list_push(tags, json!("ada")).await.unwrap();
    bob.list_push(tags, json!("bob")).await.unwrap();
    ada.stream_push(log, json!(1)).await.unwrap();
    bob.stream_push(log, json!(2)).await.unwrap();
    let only_bob = bob.create_map(fields(json!({"name": "Bob"})), group).await.unwrap();

    assert_eq!(ada.load(task).await.unwrap().field("done"), Some(&json!(false)));
    assert!(ada.load(only_bob).await.is_err());

    ada.merge_from(&bob).await;
    bob.merge_from(&ada).await;

    for id in [task, tags, log, only_bob] {
        let left = ada.load(id).await.unwrap();
        let right = bob.load(id).await.unwrap();
        assert_eq!(left.field("title"), right.field("title"));
        assert_eq!(left.items(), right.items());
    }

    let merged = ada.load(task).await.unwrap();
    assert_eq!(merged.field("done"), Some(&json!(true)));
    let title = merged.str_field("title").unwrap();
    assert!(title == "Plan A" || title == "Plan B");

    let mut items = ada.load(tags).await.unwrap().items();
    items.sort_by_key(|v| v.to_string());
    assert_eq!(items, vec![json!("a"), json!("ada"), json!("bob")]);
    assert_eq!(ada.load(log).await.unwrap().items().len(), 2);
    assert_eq!(ada.load(only_bob).await.unwrap().str_field("name"), Some("Bob"));
}

#[tokio::test]
async fn merging_twice_changes_nothing() {
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let id = store.create_list(vec![json!(1), json!(2)], group).await.unwrap();
    let replica = store.fork().await;

    store.merge_from(&replica).await;
    store.merge_from(&replica).await;

    assert_eq!(store.load(id).await.unwrap().items(), vec![json!(1), json!(2)]);
    assert_eq!(store.record_count().await, 1);
}
