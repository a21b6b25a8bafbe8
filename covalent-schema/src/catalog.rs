//! Where shape identities are recorded.

use crate::error::{SchemaError, SchemaResult};
use crate::meta::NAME_FIELD;
use async_trait::async_trait;
use covalent_store::RecordStore;
use covalent_types::{reference_from_value, GroupId, RecordId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name → ShapeDefinition index used by the registry.
#[async_trait]
pub trait ShapeCatalog: Send + Sync {
    /// The id registered under `name`, if any.
    async fn lookup(&self, name: &str) -> SchemaResult<Option<RecordId>>;

    /// Registers a newly created ShapeDefinition.
    async fn record(&self, name: &str, id: RecordId) -> SchemaResult<()>;

    /// Group that owns new ShapeDefinition records.
    fn owner(&self) -> GroupId;

    /// Every registered `(name, id)` pair.
    async fn entries(&self) -> SchemaResult<Vec<(String, RecordId)>>;
}

/// A catalog held in one map record, keyed by shape name.
///
/// Bootstrap uses one over its staging record before the permanent schema
/// index exists.
pub struct MapCatalog {
    store: Arc<dyn RecordStore>,
    map: RecordId,
    owner: GroupId,
}

impl MapCatalog {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, map: RecordId, owner: GroupId) -> Self {
        Self { store, map, owner }
    }

    #[must_use]
    pub fn map_id(&self) -> RecordId {
        self.map
    }
}

#[async_trait]
impl ShapeCatalog for MapCatalog {
    async fn lookup(&self, name: &str) -> SchemaResult<Option<RecordId>> {
        Ok(self.store.load(self.map).await?.reference(name))
    }

    async fn record(&self, name: &str, id: RecordId) -> SchemaResult<()> {
        self.store.set_field(self.map, name, id.to_value()).await?;
        Ok(())
    }

    fn owner(&self) -> GroupId {
        self.owner
    }

    async fn entries(&self) -> SchemaResult<Vec<(String, RecordId)>> {
        let record = self.store.load(self.map).await?;
        Ok(record
            .as_map()?
            .to_json()
            .into_iter()
            .filter_map(|(name, value)| {
                reference_from_value(&value).ok().map(|id| (name, id))
            })
            .collect())
    }
}

/// The permanent catalog: a `schemas` list scanned by name, plus a
/// `schema_names` map kept alongside it as a direct index.
///
/// Lookups try the index first. On a miss the list is scanned, and a hit
/// found that way is written back to the index.
pub struct StoreCatalog {
    store: Arc<dyn RecordStore>,
    schemas: RecordId,
    names: RecordId,
    owner: GroupId,
}

impl StoreCatalog {
    /// Field of the OS record holding the schema index list.
    pub const SCHEMAS_FIELD: &'static str = "schemas";
    /// Field of the OS record holding the name → id map.
    pub const NAMES_FIELD: &'static str = "schema_names";

    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        schemas: RecordId,
        names: RecordId,
        owner: GroupId,
    ) -> Self {
        Self {
            store,
            schemas,
            names,
            owner,
        }
    }

    /// Opens the catalog wired into an OS record. New ShapeDefinitions are
    /// owned by the group that owns the schema list.
    pub async fn open(store: Arc<dyn RecordStore>, os: RecordId) -> SchemaResult<Self> {
        let record = store.load(os).await?;
        let schemas = record.reference(Self::SCHEMAS_FIELD).ok_or_else(|| {
            SchemaError::UnresolvedReference(format!("{os}.{}", Self::SCHEMAS_FIELD))
        })?;
        let names = record.reference(Self::NAMES_FIELD).ok_or_else(|| {
            SchemaError::UnresolvedReference(format!("{os}.{}", Self::NAMES_FIELD))
        })?;
        let owner = store.load(schemas).await?.owner();
        Ok(Self::new(store, schemas, names, owner))
    }

    #[must_use]
    pub fn schemas_id(&self) -> RecordId {
        self.schemas
    }

    #[must_use]
    pub fn names_id(&self) -> RecordId {
        self.names
    }

    /// Linear scan of the schema list for an exact name match.
    async fn scan(&self, name: &str) -> SchemaResult<Option<RecordId>> {
        let items = self.store.load(self.schemas).await?.items();
        for item in &items {
            let Ok(id) = reference_from_value(item) else {
                continue;
            };
            match self.store.load(id).await {
                Ok(record) if record.str_field(NAME_FIELD) == Some(name) => return Ok(Some(id)),
                Ok(_) => {}
                Err(e) => debug!("Skipping unloadable schema {}: {}", id, e),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ShapeCatalog for StoreCatalog {
    async fn lookup(&self, name: &str) -> SchemaResult<Option<RecordId>> {
        if let Some(id) = self.store.load(self.names).await?.reference(name) {
            return Ok(Some(id));
        }
        let found = self.scan(name).await?;
        if let Some(id) = found {
            warn!("Schema {} missing from name index, repairing", name);
            self.store.set_field(self.names, name, id.to_value()).await?;
        }
        Ok(found)
    }

    async fn record(&self, name: &str, id: RecordId) -> SchemaResult<()> {
        self.store.list_push(self.schemas, id.to_value()).await?;
        self.store.set_field(self.names, name, id.to_value()).await?;
        Ok(())
    }

    fn owner(&self) -> GroupId {
        self.owner
    }

    async fn entries(&self) -> SchemaResult<Vec<(String, RecordId)>> {
        let items = self.store.load(self.schemas).await?.items();
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            let Ok(id) = reference_from_value(item) else {
                continue;
            };
            match self.store.load(id).await {
                Ok(record) => {
                    if let Some(name) = record.str_field(NAME_FIELD) {
                        out.push((name.to_string(), id));
                    }
                }
                Err(e) => debug!("Skipping unloadable schema {}: {}", id, e),
            }
        }
        Ok(out)
    }
}
