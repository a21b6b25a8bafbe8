use covalent_engine::EngineConfig;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.persistence_timeout_ms, 30_000);
    assert_eq!(config.persistence_timeout(), Duration::from_secs(30));
    assert_eq!(config.root_tenant_name, "°root");
    assert_eq!(config.label_fields, vec!["title", "name", "label"]);
    assert_eq!(config.resolve_depth, 2);
}

#[test]
fn partial_json_overrides_defaults() {
    let config =
        EngineConfig::from_json_str(r#"{"persistence_timeout_ms": 500, "resolve_depth": 0}"#)
            .unwrap();
    assert_eq!(config.persistence_timeout_ms, 500);
    assert_eq!(config.resolve_depth, 0);
    assert_eq!(config.root_tenant_name, "°root");
}

#[test]
fn empty_json_is_default() {
    assert_eq!(
        EngineConfig::from_json_str("{}").unwrap(),
        EngineConfig::default()
    );
}

#[test]
fn malformed_json_is_rejected() {
    assert!(EngineConfig::from_json_str(r#"{"resolve_depth": "deep"}"#).is_err());
}
