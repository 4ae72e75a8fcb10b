//! Lazily populated reference maps, keyed by resource type.
//!
//! A [`ReferenceRegistry`] is bound to one [`AppContext`]. The first read of
//! a type loads it through its registered factory; later reads return the
//! same shared map until the type is forgotten or reloaded.

use console_core::{
    AppContext, ConsoleError, ConsoleResult, ReferenceError, ReferenceItem, ReferenceMap,
    ReferenceType,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::factory::{LoadOptions, ReferenceFactory};

/// Names that framework introspection probes on lookup objects. They are
/// never reference types and must not raise an error.
const PROBE_NAMES: &[&str] = &[
    "__v_isRef",
    "__v_isReadonly",
    "__v_raw",
    "__v_skip",
    "__v_isShallow",
    "__v_isReactive",
    "toJSON",
    "then",
    "constructor",
    "$$typeof",
    "@@toStringTag",
];

pub fn is_probe_name(name: &str) -> bool {
    PROBE_NAMES.contains(&name)
}

#[derive(Debug, Default)]
struct RegistryState {
    maps: HashMap<ReferenceType, Arc<ReferenceMap>>,
    /// Forgotten since their last load; the next load skips every cache.
    flushed: HashSet<ReferenceType>,
}

pub struct ReferenceRegistry {
    ctx: AppContext,
    factories: HashMap<ReferenceType, Arc<dyn ReferenceFactory>>,
    state: RwLock<RegistryState>,
    /// Per-type load locks; present only while a load is queued or running.
    loading: Mutex<HashMap<ReferenceType, Arc<Mutex<()>>>>,
}

impl ReferenceRegistry {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            factories: HashMap::new(),
            state: RwLock::new(RegistryState::default()),
            loading: Mutex::new(HashMap::new()),
        }
    }

    /// Register `factory` under its own type, replacing any previous one.
    pub fn register(&mut self, factory: Arc<dyn ReferenceFactory>) -> &mut Self {
        let reference_type = factory.reference_type();
        if self.factories.insert(reference_type, factory).is_some() {
            debug!(reference_type = %reference_type, "replaced reference factory");
        }
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn is_registered(&self, reference_type: ReferenceType) -> bool {
        self.factories.contains_key(&reference_type)
    }

    pub fn registered_types(&self) -> Vec<ReferenceType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort();
        types
    }

    /// The map for `reference_type`, loading it on first access.
    pub async fn get(&self, reference_type: ReferenceType) -> ConsoleResult<Arc<ReferenceMap>> {
        self.load(reference_type, LoadOptions::default()).await
    }

    /// Look a type up by its snake_case or camelCase name.
    ///
    /// Probe names yield `Ok(None)`. Any other name without a registered
    /// factory is an error.
    pub async fn get_by_name(&self, name: &str) -> ConsoleResult<Option<Arc<ReferenceMap>>> {
        if is_probe_name(name) {
            return Ok(None);
        }
        let reference_type = match name.parse::<ReferenceType>() {
            Ok(t) if self.is_registered(t) => t,
            _ => {
                warn!(name, "unregistered reference resource");
                return Err(ReferenceError::UnregisteredResource {
                    name: name.to_string(),
                }
                .into());
            }
        };
        self.get(reference_type).await.map(Some)
    }

    /// Reload `reference_type` from its source, bypassing every cache.
    pub async fn reload(&self, reference_type: ReferenceType) -> ConsoleResult<Arc<ReferenceMap>> {
        self.load(reference_type, LoadOptions::forced()).await
    }

    async fn load(
        &self,
        reference_type: ReferenceType,
        options: LoadOptions,
    ) -> ConsoleResult<Arc<ReferenceMap>> {
        let factory = self.factory(reference_type)?;
        if !options.force {
            if let Some(map) = self.loaded_map(reference_type).await {
                return Ok(map);
            }
        }

        // Concurrent first reads of one type share a single load; other
        // types stay readable meanwhile.
        let lock = self.load_lock(reference_type).await;
        let result = {
            let _guard = lock.lock().await;
            self.load_locked(reference_type, factory.as_ref(), options)
                .await
        };
        self.release_load_lock(reference_type, &lock).await;
        result
    }

    async fn load_locked(
        &self,
        reference_type: ReferenceType,
        factory: &dyn ReferenceFactory,
        options: LoadOptions,
    ) -> ConsoleResult<Arc<ReferenceMap>> {
        // Loaded by whoever held the lock before us.
        if !options.force {
            if let Some(map) = self.loaded_map(reference_type).await {
                return Ok(map);
            }
        }
        let options = if self.state.read().await.flushed.contains(&reference_type) {
            LoadOptions::forced()
        } else {
            options
        };

        let map = match factory.load(&self.ctx, options).await {
            Ok(map) => Arc::new(map),
            Err(err) => {
                warn!(reference_type = %reference_type, error = %err, "reference load failed");
                // Request errors pass through so session handling still sees them.
                return Err(match err {
                    ConsoleError::Request(_) => err,
                    other => ReferenceError::LoadFailed {
                        resource_type: reference_type.to_string(),
                        reason: other.to_string(),
                    }
                    .into(),
                });
            }
        };
        debug!(
            reference_type = %reference_type,
            items = map.len(),
            forced = options.force,
            "reference map ready"
        );
        let mut state = self.state.write().await;
        state.flushed.remove(&reference_type);
        state.maps.insert(reference_type, Arc::clone(&map));
        Ok(map)
    }

    async fn loaded_map(&self, reference_type: ReferenceType) -> Option<Arc<ReferenceMap>> {
        self.state.read().await.maps.get(&reference_type).cloned()
    }

    async fn load_lock(&self, reference_type: ReferenceType) -> Arc<Mutex<()>> {
        let mut loading = self.loading.lock().await;
        loading.entry(reference_type).or_default().clone()
    }

    async fn release_load_lock(&self, reference_type: ReferenceType, lock: &Arc<Mutex<()>>) {
        let mut loading = self.loading.lock().await;
        // Only the map and this caller still hold it.
        if Arc::strong_count(lock) <= 2 {
            loading.remove(&reference_type);
        }
    }

    /// Upsert one item into an already loaded map. Readers holding the old
    /// map keep seeing it; the next read sees the new one.
    pub async fn sync(&self, reference_type: ReferenceType, item: ReferenceItem) -> bool {
        let mut state = self.state.write().await;
        match state.maps.get_mut(&reference_type) {
            Some(map) => {
                Arc::make_mut(map).insert(item);
                true
            }
            None => false,
        }
    }

    /// Drop the loaded map of `reference_type`. The next read goes back to
    /// the server, so items only known through [`sync`](Self::sync) are not
    /// replaced by an older cached listing.
    pub async fn forget(&self, reference_type: ReferenceType) -> bool {
        let mut state = self.state.write().await;
        state.flushed.insert(reference_type);
        state.maps.remove(&reference_type).is_some()
    }

    /// Forget every loaded map.
    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.flushed.extend(state.maps.keys().copied());
        state.maps.clear();
    }

    pub async fn is_loaded(&self, reference_type: ReferenceType) -> bool {
        self.state.read().await.maps.contains_key(&reference_type)
    }

    fn factory(&self, reference_type: ReferenceType) -> ConsoleResult<Arc<dyn ReferenceFactory>> {
        self.factories
            .get(&reference_type)
            .cloned()
            .ok_or_else(|| {
                ReferenceError::UnregisteredResource {
                    name: reference_type.to_string(),
                }
                .into()
            })
    }
}
