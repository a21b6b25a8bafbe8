//! Where bootstrap puts things, and how to find them again.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use covalent_store::{Record, RecordStore};
use covalent_types::{GroupId, RecordId};

/// Account root: the guardian group.
pub const GUARDIAN_FIELD: &str = "guardian";
/// Account root: the tenant registry.
pub const SPARKS_FIELD: &str = "sparks";
/// Account root: the human registry.
pub const HUMANS_FIELD: &str = "humans";

/// Root tenant: its name.
pub const NAME_FIELD: &str = "name";
/// Root tenant: its OS record.
pub const OS_FIELD: &str = "os";
/// Root tenant: its capabilities record.
pub const CAPABILITIES_FIELD: &str = "capabilities";

/// OS record: the schema index list.
pub const SCHEMAS_FIELD: &str = "schemas";
/// OS record: the schema name index.
pub const SCHEMA_NAMES_FIELD: &str = "schema_names";
/// OS record: shape id → entity index list.
pub const INDEXES_FIELD: &str = "indexes";
/// OS record: the tenant-app registry.
pub const APPS_FIELD: &str = "apps";

/// Ids of the records bootstrap wires together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantLayout {
    pub account_root: RecordId,
    pub guardian: GroupId,
    pub sparks: RecordId,
    pub humans: RecordId,
    pub spark: RecordId,
    pub os: RecordId,
    pub capabilities: RecordId,
    pub schemas: RecordId,
    pub schema_names: RecordId,
    pub indexes: RecordId,
    pub apps: RecordId,
}

fn reference(record: &Record, field: &str) -> EngineResult<RecordId> {
    record
        .reference(field)
        .ok_or_else(|| EngineError::UnresolvedReference(format!("{}.{field}", record.id())))
}

impl TenantLayout {
    /// Follows the account root down to the root tenant's OS record.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotBootstrapped`] if the account root has no tenant
    /// registry or the registry has no root tenant.
    pub async fn load(store: &dyn RecordStore, config: &EngineConfig) -> EngineResult<Self> {
        let account_root = store.account_root().await?;
        let root = store.load(account_root).await?;
        let Some(sparks) = root.reference(SPARKS_FIELD) else {
            return Err(EngineError::NotBootstrapped);
        };
        let guardian = root
            .str_field(GUARDIAN_FIELD)
            .and_then(|s| GroupId::parse(s).ok())
            .ok_or_else(|| {
                EngineError::UnresolvedReference(format!("{account_root}.{GUARDIAN_FIELD}"))
            })?;
        let humans = reference(&root, HUMANS_FIELD)?;

        let Some(spark) = store
            .load(sparks)
            .await?
            .reference(&config.root_tenant_name)
        else {
            return Err(EngineError::NotBootstrapped);
        };
        let spark_record = store.load(spark).await?;
        let os = reference(&spark_record, OS_FIELD)?;
        let capabilities = reference(&spark_record, CAPABILITIES_FIELD)?;

        let os_record = store.load(os).await?;
        Ok(Self {
            account_root,
            guardian,
            sparks,
            humans,
            spark,
            os,
            capabilities,
            schemas: reference(&os_record, SCHEMAS_FIELD)?,
            schema_names: reference(&os_record, SCHEMA_NAMES_FIELD)?,
            indexes: reference(&os_record, INDEXES_FIELD)?,
            apps: reference(&os_record, APPS_FIELD)?,
        })
    }
}
