//! First-run seeding of a store.
//!
//! Bootstrap runs once per account. It creates the guardian group, seeds
//! the meta-shape and the built-in shapes through a staging record, builds
//! the root tenant and its OS record, publishes the tenant and human
//! registries, and finally waits for the store to confirm persistence.
//! Steps run strictly in order; each one's ids feed the next.

use crate::builtin::{
    builtin_shapes, dependency_order, CAPABILITIES_SHAPE, OPERATING_SYSTEM_SHAPE, SPARK_SHAPE,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::layout::{
    APPS_FIELD, CAPABILITIES_FIELD, GUARDIAN_FIELD, HUMANS_FIELD, INDEXES_FIELD, NAME_FIELD,
    OS_FIELD, SCHEMAS_FIELD, SCHEMA_NAMES_FIELD, SPARKS_FIELD,
};
use covalent_schema::{
    InFlightShapes, MapCatalog, SchemaRegistry, Shape, ShapeHandle, LABEL_FIELD, SCHEMA_FIELD,
};
use covalent_store::{RecordStore, Role, StoreError};
use covalent_types::{GroupId, RecordId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ids produced by a successful bootstrap.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedSummary {
    pub account_root: RecordId,
    pub guardian: GroupId,
    pub sparks: RecordId,
    pub humans: RecordId,
    pub spark: RecordId,
    pub os: RecordId,
    pub capabilities: RecordId,
    pub meta: RecordId,
    /// Every ShapeDefinition created, nested ones included.
    pub shapes: BTreeMap<String, RecordId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    Seeded(SeedSummary),
    /// The account root already has a tenant registry; nothing was written.
    AlreadySeeded,
}

/// Seeds an empty store.
///
/// A no-op returning [`BootstrapOutcome::AlreadySeeded`] when the account
/// root already carries a tenant registry.
///
/// # Errors
///
/// [`EngineError::PersistenceTimeout`] if the store does not confirm the
/// account root, registries and root tenant within
/// `config.persistence_timeout_ms`. Callers must treat this as fatal: a
/// restart would seed again under new ids.
pub async fn bootstrap(
    store: Arc<dyn RecordStore>,
    config: &EngineConfig,
) -> EngineResult<BootstrapOutcome> {
    let account_root = store.account_root().await?;
    if store.load(account_root).await?.reference(SPARKS_FIELD).is_some() {
        info!("Account root {} already seeded", account_root);
        return Ok(BootstrapOutcome::AlreadySeeded);
    }
    info!("Bootstrapping account {}", store.account_id());

    let guardian = store.create_group().await?;
    debug!("Created guardian group {}", guardian);

    let staging_group = store.create_group_extending(guardian).await?;
    let staging = store.create_map(Map::new(), staging_group).await?;
    debug!("Created staging record {}", staging);

    let schema_group = store.create_group_extending(guardian).await?;
    store.set_public_role(schema_group, Some(Role::Reader)).await?;

    let registry = SchemaRegistry::new(
        Arc::clone(&store),
        Arc::new(MapCatalog::new(Arc::clone(&store), staging, schema_group)),
        InFlightShapes::new(),
    );
    let meta = registry.ensure_meta().await?;

    let builtins = builtin_shapes();
    let mut handles: BTreeMap<String, ShapeHandle> = BTreeMap::new();
    for builtin in dependency_order(&builtins)? {
        let handle = registry
            .ensure_shape(&builtin.name, Shape::Object(builtin.shape.clone()))
            .await?;
        debug!("Seeded shape {} ({})", handle.name, handle.id);
        handles.insert(builtin.name.clone(), handle);
    }
    let shapes: BTreeMap<String, RecordId> = registry.list().await?.into_iter().collect();

    // Root tenant.
    let tenant_group = store.create_group_extending(guardian).await?;

    let schema_ids: Vec<Value> = shapes.values().map(RecordId::to_value).collect();
    let schemas = store.create_list(schema_ids, schema_group).await?;
    let names: Map<String, Value> = shapes
        .iter()
        .map(|(name, id)| (name.clone(), id.to_value()))
        .collect();
    let schema_names = store.create_map(names, schema_group).await?;
    let indexes = store.create_map(Map::new(), tenant_group).await?;
    let apps = store.create_map(Map::new(), tenant_group).await?;

    let os = create_builtin(
        store.as_ref(),
        &handles,
        OPERATING_SYSTEM_SHAPE,
        OPERATING_SYSTEM_SHAPE,
        fields([
            (SCHEMAS_FIELD, schemas.to_value()),
            (SCHEMA_NAMES_FIELD, schema_names.to_value()),
            (INDEXES_FIELD, indexes.to_value()),
            (APPS_FIELD, apps.to_value()),
        ]),
        tenant_group,
    )
    .await?;

    let capabilities = create_builtin(
        store.as_ref(),
        &handles,
        CAPABILITIES_SHAPE,
        CAPABILITIES_SHAPE,
        fields([(GUARDIAN_FIELD, guardian.to_value())]),
        tenant_group,
    )
    .await?;

    let spark = create_builtin(
        store.as_ref(),
        &handles,
        SPARK_SHAPE,
        &config.root_tenant_name,
        fields([
            (NAME_FIELD, Value::String(config.root_tenant_name.clone())),
            (GUARDIAN_FIELD, guardian.to_value()),
            (OS_FIELD, os.to_value()),
            (CAPABILITIES_FIELD, capabilities.to_value()),
        ]),
        tenant_group,
    )
    .await?;
    info!("Created root tenant {} ({})", config.root_tenant_name, spark);

    // Top-level registries. The bootstrapping account keeps access only
    // through the guardian.
    let account = store.account_id();
    let sparks_group = store.create_group_extending(guardian).await?;
    store.set_public_role(sparks_group, Some(Role::Reader)).await?;
    let sparks = store
        .create_map(
            fields([(config.root_tenant_name.as_str(), spark.to_value())]),
            sparks_group,
        )
        .await?;

    let humans_group = store.create_group_extending(guardian).await?;
    store.set_public_role(humans_group, Some(Role::Reader)).await?;
    let humans = store.create_map(Map::new(), humans_group).await?;

    store.remove_member(sparks_group, account).await?;
    store.remove_member(humans_group, account).await?;

    store
        .set_field(account_root, GUARDIAN_FIELD, guardian.to_value())
        .await?;
    store
        .set_field(account_root, SPARKS_FIELD, sparks.to_value())
        .await?;
    store
        .set_field(account_root, HUMANS_FIELD, humans.to_value())
        .await?;

    discard_staging(store.as_ref(), staging).await?;

    let durable = [account_root, sparks, humans, spark];
    match store
        .confirm_persisted(&durable, config.persistence_timeout())
        .await
    {
        Ok(()) => {}
        Err(e @ StoreError::Timeout { .. }) => {
            return Err(EngineError::PersistenceTimeout(e.to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    info!("Bootstrap complete: {} shapes seeded", shapes.len());

    Ok(BootstrapOutcome::Seeded(SeedSummary {
        account_root,
        guardian,
        sparks,
        humans,
        spark,
        os,
        capabilities,
        meta: meta.id,
        shapes,
    }))
}

fn fields<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Creates a scaffold record conforming to a built-in shape.
async fn create_builtin(
    store: &dyn RecordStore,
    handles: &BTreeMap<String, ShapeHandle>,
    shape: &str,
    label: &str,
    mut data: Map<String, Value>,
    owner: GroupId,
) -> EngineResult<RecordId> {
    let handle = handles
        .get(shape)
        .ok_or_else(|| EngineError::NotFound(shape.to_string()))?;
    handle.record_shape().validate(&data)?;
    data.insert(LABEL_FIELD.to_string(), Value::String(label.to_string()));
    data.insert(SCHEMA_FIELD.to_string(), handle.id.to_value());
    Ok(store.create_map(data, owner).await?)
}

async fn discard_staging(store: &dyn RecordStore, staging: RecordId) -> EngineResult<()> {
    let record = store.load(staging).await?;
    let keys: Vec<String> = record.as_map()?.keys().map(str::to_string).collect();
    for key in &keys {
        store.delete_field(staging, key).await?;
    }
    debug!("Discarded staging record {} ({} entries)", staging, keys.len());
    Ok(())
}
