//! Removing seeded entities so a tenant can be seeded again.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::layout::TenantLayout;
use covalent_store::RecordStore;
use covalent_types::{reference_from_value, RecordId};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
    pub errors: usize,
}

/// Walks every entity index reachable from the root tenant and removes
/// each entry that is not itself a ShapeDefinition, then drops emptied
/// indexes and clears the app registry.
///
/// Failures on individual entries are counted and skipped, so a pass can
/// be re-run until `errors` is zero.
pub async fn cleanup(
    store: Arc<dyn RecordStore>,
    config: &EngineConfig,
) -> EngineResult<CleanupReport> {
    let layout = TenantLayout::load(store.as_ref(), config).await?;
    let mut report = CleanupReport::default();

    let schema_ids: HashSet<RecordId> = store
        .load(layout.schemas)
        .await?
        .items()
        .iter()
        .filter_map(|item| reference_from_value(item).ok())
        .collect();

    let indexes = store.load(layout.indexes).await?.as_map()?.to_json();
    for (shape_key, value) in &indexes {
        let Ok(index) = reference_from_value(value) else {
            warn!("Index entry {} is not a reference", shape_key);
            report.errors += 1;
            continue;
        };
        let items = match store.load(index).await {
            Ok(record) => record.items(),
            Err(e) => {
                warn!("Failed to load index {}: {}", index, e);
                report.errors += 1;
                continue;
            }
        };

        let mut kept = 0;
        // Back to front so earlier positions stay valid.
        for (position, item) in items.iter().enumerate().rev() {
            if reference_from_value(item).is_ok_and(|id| schema_ids.contains(&id)) {
                kept += 1;
                continue;
            }
            match store.list_remove(index, position).await {
                Ok(_) => report.deleted += 1,
                Err(e) => {
                    warn!("Failed to remove entry {} of index {}: {}", position, index, e);
                    report.errors += 1;
                    kept += 1;
                }
            }
        }

        if kept == 0 {
            if let Err(e) = store.delete_field(layout.indexes, shape_key).await {
                warn!("Failed to drop index {}: {}", shape_key, e);
                report.errors += 1;
            }
        }
        debug!("Cleaned index {} ({} kept)", index, kept);
    }

    let apps = store.load(layout.apps).await?.as_map()?.to_json();
    for key in apps.keys() {
        if let Err(e) = store.delete_field(layout.apps, key).await {
            warn!("Failed to clear app {}: {}", key, e);
            report.errors += 1;
        }
    }

    info!(
        "Cleanup finished: {} deleted, {} errors",
        report.deleted, report.errors
    );
    Ok(report)
}
