//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for bootstrap and CRUD.
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long bootstrap waits for durable persistence (ms).
    pub persistence_timeout_ms: u64,
    /// Key of the root tenant in the tenant registry.
    pub root_tenant_name: String,
    /// Fields tried, in order, for an entity's label.
    pub label_fields: Vec<String>,
    /// Default reference depth for [`crate::Engine::resolve`].
    pub resolve_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persistence_timeout_ms: 30_000,
            root_tenant_name: "°root".to_string(),
            label_fields: vec!["title".into(), "name".into(), "label".into()],
            resolve_depth: 2,
        }
    }
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON document over the defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }
}
