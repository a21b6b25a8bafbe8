//! The schema registry.
//!
//! [`SchemaRegistry::ensure_shape`] is the only way shapes come into
//! existence. Per name it issues at most one creation to the store no
//! matter how many callers race: concurrent callers share one pending
//! creation through [`InFlightShapes`], and later callers find the finished
//! definition through the catalog.

use crate::catalog::ShapeCatalog;
use crate::compiler::compile;
use crate::error::{SchemaError, SchemaResult};
use crate::in_flight::InFlightShapes;
use crate::meta::{meta_shape, DEFINITION_FIELD, NAME_FIELD};
use crate::record_shape::RecordShape;
use crate::shape::{ObjectShape, Shape, ShapeRef, LABEL_FIELD, META_SHAPE_NAME, SCHEMA_FIELD};
use covalent_store::{RecordStore, StoreError};
use covalent_types::RecordId;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// A stored ShapeDefinition, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHandle {
    pub id: RecordId,
    pub name: String,
    /// The compiled description: system fields present, nested objects
    /// replaced by references to their own definitions.
    pub shape: ObjectShape,
}

impl ShapeHandle {
    #[must_use]
    pub fn record_shape(&self) -> RecordShape {
        RecordShape::new(Some(self.id), self.name.clone(), self.shape.clone())
    }
}

struct RegistryInner {
    store: Arc<dyn RecordStore>,
    catalog: Arc<dyn ShapeCatalog>,
    in_flight: InFlightShapes,
}

/// Creates, finds and decodes ShapeDefinitions. Cheap to clone.
#[derive(Clone)]
pub struct SchemaRegistry {
    inner: Arc<RegistryInner>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<dyn ShapeCatalog>,
        in_flight: InFlightShapes,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                catalog,
                in_flight,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn ShapeCatalog> {
        &self.inner.catalog
    }

    /// The pending-creation table. Hand it to another registry over the
    /// same store so both issue at most one creation per name.
    #[must_use]
    pub fn in_flight(&self) -> &InFlightShapes {
        &self.inner.in_flight
    }

    /// Returns the shape registered under `name`, creating it from
    /// `description` if it does not exist yet.
    ///
    /// An existing shape is returned as stored; `description` is not
    /// compared against it.
    pub fn ensure_shape(
        &self,
        name: &str,
        description: Shape,
    ) -> BoxFuture<'static, SchemaResult<ShapeHandle>> {
        let registry = self.clone();
        let name = name.to_string();
        async move {
            let creator = registry.clone();
            let key = name.clone();
            registry
                .inner
                .in_flight
                .join_or_start(&key, move || creator.create(name, description).boxed())
                .await
        }
        .boxed()
    }

    /// Ensures the meta-shape exists.
    pub async fn ensure_meta(&self) -> SchemaResult<ShapeHandle> {
        self.ensure_shape(META_SHAPE_NAME, Shape::Object(meta_shape()))
            .await
    }

    /// Looks a shape up by name without creating it.
    pub async fn resolve(&self, name: &str) -> SchemaResult<ShapeHandle> {
        match self.inner.catalog.lookup(name).await? {
            Some(id) => self.load(id).await,
            None => Err(SchemaError::NotFound(name.to_string())),
        }
    }

    /// Decodes the ShapeDefinition stored at `id`.
    pub async fn load(&self, id: RecordId) -> SchemaResult<ShapeHandle> {
        let record = match self.inner.store.load(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                return Err(SchemaError::UnresolvedReference(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let (Some(name), Some(definition)) =
            (record.str_field(NAME_FIELD), record.field(DEFINITION_FIELD))
        else {
            return Err(SchemaError::UnresolvedReference(format!(
                "{id} is not a shape definition"
            )));
        };
        let shape: Shape = serde_json::from_value(definition.clone())
            .map_err(|e| SchemaError::Corrupt(format!("{name}: {e}")))?;
        let Shape::Object(shape) = shape else {
            return Err(SchemaError::Corrupt(format!(
                "{name}: stored definition is a {}",
                shape.kind_name()
            )));
        };
        Ok(ShapeHandle {
            id,
            name: name.to_string(),
            shape,
        })
    }

    /// Every registered `(name, id)` pair.
    pub async fn list(&self) -> SchemaResult<Vec<(String, RecordId)>> {
        self.inner.catalog.entries().await
    }

    async fn create(self, name: String, description: Shape) -> SchemaResult<ShapeHandle> {
        let is_meta = name == META_SHAPE_NAME;
        let meta_id = if is_meta {
            None
        } else {
            Some(self.ensure_meta().await?.id)
        };

        if let Some(id) = self.inner.catalog.lookup(&name).await? {
            debug!("Shape {} already registered as {}", name, id);
            return self.load(id).await;
        }

        let compiled = compile(&description)?;

        let mut wanted = compiled.root.named_dependencies();
        for child in &compiled.extracted {
            wanted.extend(child.shape.named_dependencies());
        }
        let named = self.resolve_names(&name, meta_id, wanted).await?;

        let mut paths: HashMap<String, RecordId> = HashMap::new();
        for child in &compiled.extracted {
            let child_name = format!("{name}/{}", child.path);
            let rewritten = child
                .shape
                .map_refs(&mut |target| rewrite(target, &name, false, &named, &paths))?;
            let handle = self
                .ensure_shape(&child_name, Shape::Object(rewritten))
                .await?;
            paths.insert(child.path.clone(), handle.id);
        }
        let root = compiled
            .root
            .map_refs(&mut |target| rewrite(target, &name, true, &named, &paths))?;

        let definition = serde_json::to_value(Shape::Object(root.clone()))
            .map_err(|e| SchemaError::Corrupt(format!("{name}: {e}")))?;
        let mut fields = Map::new();
        fields.insert(LABEL_FIELD.to_string(), Value::String(name.clone()));
        if let Some(meta_id) = meta_id {
            fields.insert(SCHEMA_FIELD.to_string(), meta_id.to_value());
        }
        fields.insert(NAME_FIELD.to_string(), Value::String(name.clone()));
        fields.insert(DEFINITION_FIELD.to_string(), definition);

        let store = &self.inner.store;
        let id = store.create_map(fields, self.inner.catalog.owner()).await?;
        if is_meta {
            store.set_field(id, SCHEMA_FIELD, id.to_value()).await?;
        }
        self.inner.catalog.record(&name, id).await?;
        info!("Created shape {} ({})", name, id);

        Ok(ShapeHandle {
            id,
            name,
            shape: root,
        })
    }

    /// Looks up every shape named through a `Named` reference. The shape's
    /// own name and the meta-shape are handled without a lookup.
    async fn resolve_names(
        &self,
        own: &str,
        meta_id: Option<RecordId>,
        wanted: BTreeSet<String>,
    ) -> SchemaResult<BTreeMap<String, RecordId>> {
        let mut named = BTreeMap::new();
        for target in wanted {
            if target == own {
                continue;
            }
            if target == META_SHAPE_NAME {
                if let Some(meta_id) = meta_id {
                    named.insert(target, meta_id);
                }
                continue;
            }
            match self.inner.catalog.lookup(&target).await? {
                Some(id) => {
                    named.insert(target, id);
                }
                None => {
                    return Err(SchemaError::UnresolvedReference(format!(
                        "{own} references unknown shape {target}"
                    )));
                }
            }
        }
        Ok(named)
    }
}

fn rewrite(
    target: &ShapeRef,
    own: &str,
    at_root: bool,
    named: &BTreeMap<String, RecordId>,
    paths: &HashMap<String, RecordId>,
) -> SchemaResult<ShapeRef> {
    match target {
        ShapeRef::Id(_) | ShapeRef::Itself => Ok(target.clone()),
        ShapeRef::Path(path) => paths
            .get(path)
            .map(|id| ShapeRef::Id(*id))
            .ok_or_else(|| SchemaError::Corrupt(format!("{own}: no sub-shape at {path}"))),
        ShapeRef::Named(name) if name == own => {
            if at_root {
                Ok(ShapeRef::Itself)
            } else {
                Err(SchemaError::UnresolvedReference(format!(
                    "a nested shape of {own} cannot reference {own} by name"
                )))
            }
        }
        ShapeRef::Named(name) => named
            .get(name)
            .map(|id| ShapeRef::Id(*id))
            .ok_or_else(|| SchemaError::UnresolvedReference(name.clone())),
    }
}
