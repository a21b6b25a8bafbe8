//! Shared helpers for engine tests.

#![allow(dead_code)]

use covalent_engine::{bootstrap, BootstrapOutcome, Engine, EngineConfig, SeedSummary};
use covalent_schema::{ObjectShape, Shape};
use covalent_store::{MemoryStore, RecordStore};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn seeded_store() -> (MemoryStore, SeedSummary) {
    init_tracing();
    let store = MemoryStore::new();
    let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
    match bootstrap(shared, &EngineConfig::default()).await.unwrap() {
        BootstrapOutcome::Seeded(summary) => (store, summary),
        BootstrapOutcome::AlreadySeeded => panic!("fresh store reported as seeded"),
    }
}

/// A bootstrapped store with an engine opened on it.
pub async fn engine() -> (MemoryStore, Engine) {
    let (store, _) = seeded_store().await;
    let engine = Engine::open(Arc::new(store.clone()), EngineConfig::default())
        .await
        .unwrap();
    (store, engine)
}

pub fn todo_shape() -> Shape {
    Shape::object(
        ObjectShape::new()
            .required("title", Shape::string())
            .optional("done", Shape::boolean())
            .optional("notes", Shape::string()),
    )
}

pub fn project_shape() -> Shape {
    Shape::object(
        ObjectShape::new()
            .required("name", Shape::string())
            .optional(
                "owner",
                Shape::object(
                    ObjectShape::new()
                        .required("name", Shape::string())
                        .optional("email", Shape::string()),
                ),
            )
            .optional("tags", Shape::list_of(Shape::string()))
            .optional(
                "tasks",
                Shape::list_of(Shape::object(
                    ObjectShape::new()
                        .required("title", Shape::string())
                        .optional("done", Shape::boolean()),
                )),
            )
            .optional("log", Shape::stream_of(Shape::string()))
            .optional("parent", Shape::named("Project")),
    )
}
