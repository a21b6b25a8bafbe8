//! Shared helpers for schema tests.

#![allow(dead_code)]

use covalent_schema::{InFlightShapes, MapCatalog, SchemaRegistry, StoreCatalog};
use covalent_store::{MemoryStore, RecordStore};
use serde_json::{Map, Value};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

/// A registry recording into a single map, as bootstrap staging does.
pub async fn map_registry() -> (MemoryStore, SchemaRegistry) {
    init_tracing();
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let map = store.create_map(Map::new(), group).await.unwrap();
    let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
    let catalog = MapCatalog::new(Arc::clone(&shared), map, group);
    let registry = SchemaRegistry::new(shared, Arc::new(catalog), InFlightShapes::new());
    (store, registry)
}

/// A registry over a permanent schema list and name index.
pub async fn store_registry() -> (MemoryStore, StoreCatalog, SchemaRegistry) {
    init_tracing();
    let store = MemoryStore::new();
    let group = store.create_group().await.unwrap();
    let schemas = store.create_list(Vec::new(), group).await.unwrap();
    let names = store.create_map(Map::new(), group).await.unwrap();
    let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
    let catalog = StoreCatalog::new(Arc::clone(&shared), schemas, names, group);
    let registry = SchemaRegistry::new(
        Arc::clone(&shared),
        Arc::new(StoreCatalog::new(shared, schemas, names, group)),
        InFlightShapes::new(),
    );
    (store, catalog, registry)
}

/// Number of ShapeDefinition records named `name`, regardless of catalog.
pub async fn definitions_named(store: &MemoryStore, name: &str) -> usize {
    store
        .maps_with_field("name", &Value::String(name.to_string()))
        .await
        .len()
}
