//! Per-name creation locks.

use crate::error::SchemaResult;
use crate::registry::ShapeHandle;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type Pending = Shared<BoxFuture<'static, SchemaResult<ShapeHandle>>>;

/// Tracks shape creations that have started but not settled.
///
/// Construct one per registry (or share one between registries over the
/// same store) and inject it. An entry is added when the first caller for a
/// name starts a creation and removed when that creation settles, success
/// or failure, so a failed attempt can be retried from scratch.
#[derive(Clone, Default)]
pub struct InFlightShapes {
    pending: Arc<Mutex<HashMap<String, Pending>>>,
}

impl InFlightShapes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Awaits the creation already running for `name`, or starts one with
    /// `start`. Every concurrent caller gets the same outcome.
    pub async fn join_or_start<F>(&self, name: &str, start: F) -> SchemaResult<ShapeHandle>
    where
        F: FnOnce() -> BoxFuture<'static, SchemaResult<ShapeHandle>>,
    {
        let pending = {
            let mut map = self.lock();
            match map.get(name) {
                // A finished entry whose settle step never ran is stale.
                Some(existing) if existing.peek().is_none() => {
                    debug!("Joining in-flight creation of shape {}", name);
                    existing.clone()
                }
                _ => {
                    let this = self.clone();
                    let key = name.to_string();
                    let creation = start();
                    let pending = async move {
                        let outcome = creation.await;
                        this.settle(&key);
                        outcome
                    }
                    .boxed()
                    .shared();
                    map.insert(name.to_string(), pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn settle(&self, name: &str) {
        self.lock().remove(name);
    }

    /// True while a creation for `name` is running.
    #[must_use]
    pub fn is_pending(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|pending| pending.peek().is_none())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
