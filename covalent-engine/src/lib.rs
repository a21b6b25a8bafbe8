//! Bootstrap, generic CRUD and cleanup for covalent.
//!
//! # Usage
//!
//! ```ignore
//! let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
//! let config = EngineConfig::default();
//! bootstrap(Arc::clone(&store), &config).await?;
//!
//! let engine = Engine::open(store, config).await?;
//! engine.ensure_shape("Todo", todo_shape).await?;
//! let todo = engine.create("Todo", json!({"title": "Buy milk"})).await?;
//! let todos = engine.query("Todo").await;
//! ```

mod bootstrap;
mod builtin;
mod cleanup;
mod config;
mod crud;
mod entity;
mod error;
mod layout;

pub use bootstrap::{bootstrap, BootstrapOutcome, SeedSummary};
pub use builtin::{
    builtin_shapes, dependency_order, BuiltinShape, CAPABILITIES_SHAPE, HUMAN_SHAPE, INBOX_SHAPE,
    MESSAGE_SHAPE, OPERATING_SYSTEM_SHAPE, SPARK_SHAPE,
};
pub use cleanup::{cleanup, CleanupReport};
pub use config::EngineConfig;
pub use crud::Engine;
pub use entity::Entity;
pub use error::{EngineError, EngineResult};
pub use layout::TenantLayout;
