use covalent_types::{reference_from_value, AccountId, Error, GroupId, RecordId};
use serde_json::json;
use std::collections::HashSet;
use std::str::FromStr;

// ── RecordId ──────────────────────────────────────────────────────

#[test]
fn record_id_new_is_unique() {
    assert_ne!(RecordId::new(), RecordId::new());
}

#[test]
fn record_id_display_and_parse() {
    let id = RecordId::new();
    let parsed = RecordId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn record_id_from_str_invalid() {
    assert!(RecordId::from_str("garbage").is_err());
}

#[test]
fn record_id_serializes_transparently() {
    let id = RecordId::new();
    let json = serde_json::to_value(id).unwrap();
    assert_eq!(json, json!(id.to_string()));
    assert_eq!(json, id.to_value());
}

#[test]
fn record_ids_are_time_ordered() {
    let a = RecordId::new();
    let b = RecordId::new();
    assert!(a < b);
}

#[test]
fn record_id_hashes() {
    let id = RecordId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

// ── GroupId / AccountId ───────────────────────────────────────────

#[test]
fn group_id_roundtrip() {
    let id = GroupId::new();
    assert_eq!(GroupId::from_str(&id.to_string()).unwrap(), id);
    assert_eq!(GroupId::from_uuid(id.as_uuid()), id);
}

#[test]
fn account_id_roundtrip() {
    let id = AccountId::new();
    assert_eq!(AccountId::parse(&id.to_string()).unwrap(), id);
    assert!(AccountId::parse("nope").is_err());
}

// ── reference_from_value ──────────────────────────────────────────

#[test]
fn reference_from_string_value() {
    let id = RecordId::new();
    assert_eq!(reference_from_value(&id.to_value()).unwrap(), id);
}

#[test]
fn reference_from_non_string_fails() {
    assert!(reference_from_value(&json!(42)).is_err());
    assert!(reference_from_value(&json!({"id": "x"})).is_err());
}

#[test]
fn reference_from_malformed_string_fails() {
    assert!(reference_from_value(&json!("not-a-uuid")).is_err());
}

#[test]
fn reference_errors_name_their_cause() {
    let kind = |err: Error| match err {
        Error::InvalidId(_) => "id",
        Error::NotAReference(_) => "reference",
    };
    assert_eq!(kind(reference_from_value(&json!("nope")).unwrap_err()), "id");
    assert_eq!(kind(reference_from_value(&json!(7)).unwrap_err()), "reference");
}
