//! Generic CRUD over registered shapes.
//!
//! No operation here knows any shape in advance. `create` looks the shape
//! up by name; `update` and `delete` read it from the entity's own
//! `@schema` field, so callers never assert what type a record is.

use crate::cleanup::{cleanup, CleanupReport};
use crate::config::EngineConfig;
use crate::entity::Entity;
use crate::error::{EngineError, EngineResult};
use crate::layout::TenantLayout;
use covalent_schema::{
    is_system_field, InFlightShapes, RecordShape, SchemaRegistry, Shape, ShapeHandle, StoreCatalog,
    LABEL_FIELD, SCHEMA_FIELD,
};
use covalent_store::{RecordStore, StoreError};
use covalent_types::{reference_from_value, GroupId, RecordId};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A validated record waiting to be written.
struct MapPlan {
    shape: RecordShape,
    fields: Vec<(String, FieldPlan)>,
}

enum FieldPlan {
    Value(Value),
    /// An object given for a reference field, created as a child record.
    Child(Box<MapPlan>),
    List(Vec<FieldPlan>),
    Stream(Vec<FieldPlan>),
    /// `null` in an update.
    Clear,
}

impl MapPlan {
    /// Shapes of this record and every child it will create.
    fn shape_ids(&self, out: &mut Vec<RecordId>) {
        if let Some(id) = self.shape.id {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        for (_, field) in &self.fields {
            field.shape_ids(out);
        }
    }
}

impl FieldPlan {
    fn shape_ids(&self, out: &mut Vec<RecordId>) {
        match self {
            Self::Child(child) => child.shape_ids(out),
            Self::List(items) | Self::Stream(items) => {
                for item in items {
                    item.shape_ids(out);
                }
            }
            Self::Value(_) | Self::Clear => {}
        }
    }
}

/// A map record written from a plan: `(shape, record)`.
type Written = (RecordId, RecordId);

/// Entry point for application code.
pub struct Engine {
    store: Arc<dyn RecordStore>,
    config: EngineConfig,
    layout: TenantLayout,
    registry: SchemaRegistry,
    /// Serializes creation of per-shape entity indexes.
    index_lock: Mutex<()>,
}

impl Engine {
    /// Opens a bootstrapped store.
    ///
    /// The engine gets its own shape-creation table, so two engines opened
    /// this way may race on a new shape name. Use [`Engine::with_in_flight`]
    /// with [`Engine::in_flight`] of an existing engine to share it.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotBootstrapped`] if the account has no root tenant.
    pub async fn open(store: Arc<dyn RecordStore>, config: EngineConfig) -> EngineResult<Self> {
        Self::with_in_flight(store, config, InFlightShapes::new()).await
    }

    /// Opens a bootstrapped store, sharing shape-creation locks with other
    /// engines over the same store.
    pub async fn with_in_flight(
        store: Arc<dyn RecordStore>,
        config: EngineConfig,
        in_flight: InFlightShapes,
    ) -> EngineResult<Self> {
        let layout = TenantLayout::load(store.as_ref(), &config).await?;
        let catalog = StoreCatalog::open(Arc::clone(&store), layout.os).await?;
        let registry = SchemaRegistry::new(Arc::clone(&store), Arc::new(catalog), in_flight);
        debug!("Opened engine on tenant {}", layout.spark);
        Ok(Self {
            store,
            config,
            layout,
            registry,
            index_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Pending shape creations, for [`Engine::with_in_flight`].
    #[must_use]
    pub fn in_flight(&self) -> InFlightShapes {
        self.registry.in_flight().clone()
    }

    #[must_use]
    pub fn layout(&self) -> &TenantLayout {
        &self.layout
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Returns the shape registered under `name`, creating it if needed.
    pub async fn ensure_shape(&self, name: &str, description: Shape) -> EngineResult<ShapeHandle> {
        Ok(self.registry.ensure_shape(name, description).await?)
    }

    // ── Create ───────────────────────────────────────────────────

    /// Creates an entity of the named shape.
    ///
    /// All of `data`, nested objects included, is validated before anything
    /// is written. Records created from nested objects are entities of
    /// their own shape and land in that shape's index.
    pub async fn create(&self, shape_name: &str, data: Value) -> EngineResult<Entity> {
        let handle = self.registry.resolve(shape_name).await?;
        let Value::Object(data) = data else {
            return Err(not_an_object(shape_name, &data));
        };
        let plan = self.plan(handle.record_shape(), data).await?;

        let index = self.index_for(handle.id).await?;
        let owner = self
            .store
            .load(index)
            .await
            .map(|record| record.owner())
            .map_err(|e| EngineError::OwnerResolution(format!("{shape_name}: {e}")))?;
        let mut shapes = Vec::new();
        plan.shape_ids(&mut shapes);
        for shape_id in shapes {
            self.index_for(shape_id).await?;
        }

        let mut written = Vec::new();
        let id = self.write(plan, owner, &mut written).await?;
        self.index_written(&written).await?;
        info!("Created {} {}", shape_name, id);
        self.read(id).await
    }

    fn plan(
        &self,
        shape: RecordShape,
        data: Map<String, Value>,
    ) -> BoxFuture<'_, EngineResult<MapPlan>> {
        async move {
            shape.validate(&data)?;
            let mut fields = Vec::new();
            for (key, value) in data {
                if is_system_field(&key) || value.is_null() {
                    continue;
                }
                let planned = self.plan_field(&shape, &key, value).await?;
                fields.push((key, planned));
            }
            Ok(MapPlan { shape, fields })
        }
        .boxed()
    }

    async fn plan_field(
        &self,
        parent: &RecordShape,
        key: &str,
        value: Value,
    ) -> EngineResult<FieldPlan> {
        let field_shape = parent
            .shape
            .field(key)
            .map(|def| def.shape.clone())
            .ok_or_else(|| EngineError::Validation {
                shape: parent.name.clone(),
                field: key.to_string(),
                reason: "unknown field".into(),
            })?;
        match (field_shape, value) {
            (Shape::ListOf { items }, Value::Array(values)) => {
                Ok(FieldPlan::List(self.plan_items(parent, key, &items, values).await?))
            }
            (Shape::StreamOf { items }, Value::Array(values)) => {
                Ok(FieldPlan::Stream(self.plan_items(parent, key, &items, values).await?))
            }
            (shape, value) => self.plan_value(parent, key, &shape, value).await,
        }
    }

    async fn plan_items(
        &self,
        parent: &RecordShape,
        key: &str,
        items: &Shape,
        values: Vec<Value>,
    ) -> EngineResult<Vec<FieldPlan>> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            out.push(self.plan_value(parent, key, items, value).await?);
        }
        Ok(out)
    }

    /// Objects given for a reference become child plans, validated against
    /// the referenced shape. Ids given for a reference must name an existing
    /// record of that shape. Everything else is stored as given.
    async fn plan_value(
        &self,
        parent: &RecordShape,
        key: &str,
        shape: &Shape,
        value: Value,
    ) -> EngineResult<FieldPlan> {
        match (shape, value) {
            (Shape::Reference { to }, Value::String(raw)) => {
                let invalid = |reason: String| EngineError::Validation {
                    shape: parent.name.clone(),
                    field: key.to_string(),
                    reason,
                };
                let target = RecordId::parse(&raw)
                    .map_err(|e| invalid(format!("not a record id: {e}")))?;
                let record = match self.store.load(target).await {
                    Ok(record) => record,
                    Err(StoreError::NotFound(_)) => {
                        return Err(invalid(format!("references missing record {target}")));
                    }
                    Err(e) => return Err(e.into()),
                };
                if let Some(expected) = parent.resolve_ref(to) {
                    if record.reference(SCHEMA_FIELD) != Some(expected) {
                        return Err(invalid(format!(
                            "{target} is not a record of shape {expected}"
                        )));
                    }
                }
                Ok(FieldPlan::Value(Value::String(raw)))
            }
            (Shape::Reference { to }, Value::Object(map)) => {
                let target = parent.resolve_ref(to).ok_or_else(|| {
                    EngineError::UnresolvedReference(format!("{}: {to:?}", parent.name))
                })?;
                let child = if Some(target) == parent.id {
                    parent.clone()
                } else {
                    self.registry.load(target).await?.record_shape()
                };
                Ok(FieldPlan::Child(Box::new(self.plan(child, map).await?)))
            }
            (_, value) => Ok(FieldPlan::Value(value)),
        }
    }

    /// Writes a plan, children first. Every map record created is appended
    /// to `written`.
    fn write<'a>(
        &'a self,
        plan: MapPlan,
        owner: GroupId,
        written: &'a mut Vec<Written>,
    ) -> BoxFuture<'a, EngineResult<RecordId>> {
        async move {
            let mut fields = Map::new();
            for (key, planned) in plan.fields {
                if let Some(value) = self.write_field(planned, owner, written).await? {
                    fields.insert(key, value);
                }
            }
            fields.insert(
                LABEL_FIELD.to_string(),
                Value::String(self.label_for(&plan.shape, &fields)),
            );
            if let Some(shape_id) = plan.shape.id {
                fields.insert(SCHEMA_FIELD.to_string(), shape_id.to_value());
            }
            let id = self.store.create_map(fields, owner).await?;
            if let Some(shape_id) = plan.shape.id {
                written.push((shape_id, id));
            }
            debug!("Wrote {} record {}", plan.shape.name, id);
            Ok(id)
        }
        .boxed()
    }

    /// The stored value for a planned field; `None` for a cleared field.
    async fn write_field(
        &self,
        planned: FieldPlan,
        owner: GroupId,
        written: &mut Vec<Written>,
    ) -> EngineResult<Option<Value>> {
        let value = match planned {
            FieldPlan::Value(value) => value,
            FieldPlan::Child(child) => self.write(*child, owner, written).await?.to_value(),
            FieldPlan::List(items) => {
                let values = self.write_items(items, owner, written).await?;
                self.store.create_list(values, owner).await?.to_value()
            }
            FieldPlan::Stream(items) => {
                let values = self.write_items(items, owner, written).await?;
                let stream = self.store.create_stream(owner).await?;
                for value in values {
                    self.store.stream_push(stream, value).await?;
                }
                stream.to_value()
            }
            FieldPlan::Clear => return Ok(None),
        };
        Ok(Some(value))
    }

    async fn write_items(
        &self,
        items: Vec<FieldPlan>,
        owner: GroupId,
        written: &mut Vec<Written>,
    ) -> EngineResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                FieldPlan::Value(value) => values.push(value),
                FieldPlan::Child(child) => {
                    values.push(self.write(*child, owner, written).await?.to_value());
                }
                // Item plans are only ever values or children.
                FieldPlan::List(_) | FieldPlan::Stream(_) | FieldPlan::Clear => {}
            }
        }
        Ok(values)
    }

    fn label_for(&self, shape: &RecordShape, fields: &Map<String, Value>) -> String {
        self.config
            .label_fields
            .iter()
            .find_map(|key| fields.get(key).and_then(Value::as_str))
            .map_or_else(|| shape.name.clone(), str::to_string)
    }

    /// Lists each written record in its shape's index.
    async fn index_written(&self, written: &[Written]) -> EngineResult<()> {
        for (shape_id, id) in written {
            let index = self.index_for(*shape_id).await?;
            self.store.list_push(index, id.to_value()).await?;
        }
        Ok(())
    }

    /// The entity index for a shape, created on first use under its own
    /// group extending the guardian.
    async fn index_for(&self, shape_id: RecordId) -> EngineResult<RecordId> {
        let key = shape_id.to_string();
        if let Some(index) = self.store.load(self.layout.indexes).await?.reference(&key) {
            return Ok(index);
        }

        let _guard = self.index_lock.lock().await;
        if let Some(index) = self.store.load(self.layout.indexes).await?.reference(&key) {
            return Ok(index);
        }
        let owner_error = |e: covalent_store::StoreError| {
            EngineError::OwnerResolution(format!("index for shape {shape_id}: {e}"))
        };
        let group = self
            .store
            .create_group_extending(self.layout.guardian)
            .await
            .map_err(owner_error)?;
        let index = self
            .store
            .create_list(Vec::new(), group)
            .await
            .map_err(owner_error)?;
        self.store
            .set_field(self.layout.indexes, &key, index.to_value())
            .await
            .map_err(owner_error)?;
        debug!("Created entity index {} for shape {}", index, shape_id);
        Ok(index)
    }

    /// The existing entity index for a shape.
    async fn find_index(&self, shape_id: RecordId) -> EngineResult<Option<RecordId>> {
        Ok(self
            .store
            .load(self.layout.indexes)
            .await?
            .reference(&shape_id.to_string()))
    }

    // ── Read ─────────────────────────────────────────────────────

    pub async fn read(&self, id: RecordId) -> EngineResult<Entity> {
        let record = self.store.load(id).await?;
        Ok(Entity::from_record(&record)?)
    }

    /// The entity's stored fields with references expanded `depth` levels.
    /// List and stream fields become arrays of their items. A reference that
    /// cannot be loaded is left as an id.
    pub fn resolve(&self, id: RecordId, depth: usize) -> BoxFuture<'_, EngineResult<Value>> {
        async move {
            let record = self.store.load(id).await?;
            let mut out = record.as_map()?.to_json();
            out.insert("@id".to_string(), id.to_value());
            if depth == 0 {
                return Ok(Value::Object(out));
            }
            let Some(shape_id) = record.reference(SCHEMA_FIELD) else {
                return Ok(Value::Object(out));
            };
            let shape = self.registry.load(shape_id).await?.record_shape();

            for (key, def) in shape.user_fields() {
                let Some(value) = out.get(key).cloned() else {
                    continue;
                };
                let expanded = match &def.shape {
                    Shape::Reference { .. } => self.expand_reference(&value, depth).await,
                    Shape::ListOf { items } | Shape::StreamOf { items } => {
                        self.expand_collection(&value, items, depth).await
                    }
                    _ => None,
                };
                if let Some(expanded) = expanded {
                    out.insert(key.to_string(), expanded);
                }
            }
            Ok(Value::Object(out))
        }
        .boxed()
    }

    /// Resolves with the configured default depth.
    pub async fn resolve_default(&self, id: RecordId) -> EngineResult<Value> {
        self.resolve(id, self.config.resolve_depth).await
    }

    async fn expand_reference(&self, value: &Value, depth: usize) -> Option<Value> {
        let target = reference_from_value(value).ok()?;
        match self.resolve(target, depth - 1).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                debug!("Leaving reference {} unexpanded: {}", target, e);
                None
            }
        }
    }

    async fn expand_collection(&self, value: &Value, items: &Shape, depth: usize) -> Option<Value> {
        let target = reference_from_value(value).ok()?;
        let record = self.store.load(target).await.ok()?;
        let mut out = Vec::new();
        for item in record.items() {
            let expanded = match items {
                Shape::Reference { .. } => self.expand_reference(&item, depth).await,
                _ => None,
            };
            out.push(expanded.unwrap_or(item));
        }
        Some(Value::Array(out))
    }

    // ── Update ───────────────────────────────────────────────────

    /// Applies a partial update. The shape comes from the entity itself.
    /// Every field is validated before any is written; `null` clears an
    /// optional field.
    pub async fn update(&self, id: RecordId, partial: Value) -> EngineResult<Entity> {
        let record = self.store.load(id).await?;
        let shape_id = record.reference(SCHEMA_FIELD).ok_or_else(|| {
            EngineError::UnresolvedReference(format!("{id} has no shape reference"))
        })?;
        let shape = self.registry.load(shape_id).await?.record_shape();
        let Value::Object(partial) = partial else {
            return Err(not_an_object(&shape.name, &partial));
        };
        shape.validate_partial(&partial)?;

        let mut planned = Vec::with_capacity(partial.len());
        let mut shapes = Vec::new();
        for (key, value) in partial {
            let field = if value.is_null() {
                FieldPlan::Clear
            } else {
                self.plan_field(&shape, &key, value).await?
            };
            field.shape_ids(&mut shapes);
            planned.push((key, field));
        }
        for shape_id in shapes {
            self.index_for(shape_id).await?;
        }

        let owner = record.owner();
        let mut touched_label = false;
        let mut written = Vec::new();
        for (key, field) in planned {
            touched_label |= self.config.label_fields.contains(&key);
            match self.write_field(field, owner, &mut written).await? {
                Some(value) => self.store.set_field(id, &key, value).await?,
                None => self.store.delete_field(id, &key).await?,
            }
        }
        self.index_written(&written).await?;

        if touched_label {
            let fields = self.store.load(id).await?.as_map()?.to_json();
            let label = self.label_for(&shape, &fields);
            if fields.get(LABEL_FIELD).and_then(Value::as_str) != Some(label.as_str()) {
                self.store
                    .set_field(id, LABEL_FIELD, Value::String(label))
                    .await?;
            }
        }
        debug!("Updated {} {}", shape.name, id);
        self.read(id).await
    }

    // ── Delete ───────────────────────────────────────────────────

    /// Removes an entity from its shape's index.
    ///
    /// Records in a replicated store are never destroyed; a deleted entity
    /// is one no index lists any more.
    pub async fn delete(&self, id: RecordId) -> EngineResult<()> {
        let record = self.store.load(id).await?;
        let shape_id = record.reference(SCHEMA_FIELD).ok_or_else(|| {
            EngineError::UnresolvedReference(format!("{id} has no shape reference"))
        })?;
        let index = self
            .find_index(shape_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("{id} is not indexed")))?;
        let needle = id.to_value();
        let position = self
            .store
            .load(index)
            .await?
            .items()
            .iter()
            .position(|item| *item == needle)
            .ok_or_else(|| EngineError::NotFound(format!("{id} is not indexed")))?;
        self.store.list_remove(index, position).await?;
        info!("Deleted {}", id);
        Ok(())
    }

    // ── Query ────────────────────────────────────────────────────

    /// Every indexed entity whose own shape reference is exactly the named
    /// shape. Empty if the shape, its index or the index record is missing.
    pub async fn query(&self, shape_name: &str) -> Vec<Entity> {
        self.query_with(shape_name, Some).await
    }

    /// Like [`Engine::query`], passing each match through `convert` and
    /// keeping the `Some` results.
    pub async fn query_with<T, F>(&self, shape_name: &str, mut convert: F) -> Vec<T>
    where
        F: FnMut(Entity) -> Option<T>,
    {
        let shape_id = match self.registry.resolve(shape_name).await {
            Ok(handle) => handle.id,
            Err(e) => {
                debug!("Query for {} found no shape: {}", shape_name, e);
                return Vec::new();
            }
        };
        let index = match self.find_index(shape_id).await {
            Ok(Some(index)) => index,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Entity index for {} unavailable: {}", shape_name, e);
                return Vec::new();
            }
        };
        let items = match self.store.load(index).await {
            Ok(record) => record.items(),
            Err(e) => {
                warn!("Entity index {} failed to load: {}", index, e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for item in &items {
            let Ok(id) = reference_from_value(item) else {
                continue;
            };
            let record = match self.store.load(id).await {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping unloadable entity {}: {}", id, e);
                    continue;
                }
            };
            if record.reference(SCHEMA_FIELD) != Some(shape_id) {
                continue;
            }
            if let Ok(entity) = Entity::from_record(&record) {
                if let Some(converted) = convert(entity) {
                    out.push(converted);
                }
            }
        }
        out
    }

    // ── Cleanup ──────────────────────────────────────────────────

    /// Removes every seeded entity so the tenant can be seeded again.
    pub async fn cleanup(&self) -> EngineResult<CleanupReport> {
        cleanup(Arc::clone(&self.store), &self.config).await
    }
}

fn not_an_object(shape: &str, value: &Value) -> EngineError {
    EngineError::Validation {
        shape: shape.to_string(),
        field: String::new(),
        reason: format!("expected an object, got {value}"),
    }
}
