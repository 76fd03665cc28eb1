//! Layer routing and per-layer serialisation.
//!
//! [`LayerRouter`] keeps the registered adapters in registration order and
//! forwards each operation to the first adapter that claims the layer.
//! Operations on one layer name are serialised through a reader-writer
//! lock: reads share it, mutations hold it exclusively. Different layers
//! never contend.

use std::{
    collections::HashMap,
    fmt, mem,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::debug;

use crate::FeatureStore;

#[derive(Debug, Default)]
struct LayerLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl LayerLocks {
    fn acquire(&self, layer: &str) -> LayerLock<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(locks.entry(layer.to_owned()).or_default());
        LayerLock {
            owner: self,
            layer: layer.to_owned(),
            lock,
        }
    }

    fn release(&self, layer: &str, lock: Arc<RwLock<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Handles are cloned and dropped only under the map lock.
        drop(lock);
        if locks
            .get(layer)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(layer);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle on one layer's lock; drops the map entry with its last holder.
struct LayerLock<'a> {
    owner: &'a LayerLocks,
    layer: String,
    lock: Arc<RwLock<()>>,
}

impl LayerLock<'_> {
    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LayerLock<'_> {
    fn drop(&mut self) {
        let lock = mem::take(&mut self.lock);
        self.owner.release(&self.layer, lock);
    }
}

/// Registry of adapters dispatching by layer name.
///
/// # Examples
///
/// ```
/// use wharyo_core::{LayerRouter, test_support::MemoryFeatureStore};
///
/// let router = LayerRouter::new().with_store(MemoryFeatureStore::new());
/// assert_eq!(router.len(), 1);
/// assert!(router.select("unknown").is_none());
/// ```
#[derive(Default)]
pub struct LayerRouter {
    stores: Vec<Box<dyn FeatureStore>>,
    locks: LayerLocks,
}

impl LayerRouter {
    /// An empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an adapter. Earlier registrations win ties.
    pub fn register<S>(&mut self, store: S) -> &mut Self
    where
        S: FeatureStore + 'static,
    {
        self.stores.push(Box::new(store));
        self
    }

    /// Builder form of [`LayerRouter::register`].
    #[must_use]
    pub fn with_store<S>(mut self, store: S) -> Self
    where
        S: FeatureStore + 'static,
    {
        self.register(store);
        self
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// The first adapter, in registration order, that supports `layer`.
    #[must_use]
    pub fn select(&self, layer: &str) -> Option<&dyn FeatureStore> {
        let selected = self
            .stores
            .iter()
            .map(|store| &**store)
            .find(|store| store.supports_layer(layer));
        if let Some(store) = selected {
            debug!("routing layer {layer:?} to the {} store", store.backend());
        }
        selected
    }

    /// Run a read-only operation against the adapter serving `layer`.
    ///
    /// The layer's shared lock is held for the duration of `operation`.
    /// Returns `None`, without taking any lock, when no adapter supports the
    /// layer.
    pub fn read<T, F>(&self, layer: &str, operation: F) -> Option<T>
    where
        F: FnOnce(&dyn FeatureStore) -> T,
    {
        let store = self.select(layer)?;
        let handle = self.locks.acquire(layer);
        let _shared = handle.shared();
        Some(operation(store))
    }

    /// Run a mutating operation against the adapter serving `layer`.
    ///
    /// The layer's exclusive lock is held for the duration of `operation`.
    /// Returns `None`, without taking any lock, when no adapter supports the
    /// layer.
    pub fn write<T, F>(&self, layer: &str, operation: F) -> Option<T>
    where
        F: FnOnce(&dyn FeatureStore) -> T,
    {
        let store = self.select(layer)?;
        let handle = self.locks.acquire(layer);
        let _exclusive = handle.exclusive();
        Some(operation(store))
    }
}

impl fmt::Debug for LayerRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backends: Vec<&str> = self.stores.iter().map(|store| store.backend()).collect();
        f.debug_struct("LayerRouter")
            .field("stores", &backends)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Barrier,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    use geo::Point;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        FeatureGeometry, FeatureId, FieldType, GeometryKind, SchemaDescriptor, SchemaField,
        test_support::MemoryFeatureStore,
    };

    fn points_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(
            vec![
                SchemaField::new("geom", FieldType::Geometry(GeometryKind::Point)),
                SchemaField::new("id", FieldType::Long),
            ],
            None,
        )
    }

    #[fixture]
    fn stores() -> (Arc<MemoryFeatureStore>, Arc<MemoryFeatureStore>) {
        let first = Arc::new(MemoryFeatureStore::new().with_layer("shared", points_schema()));
        let second = Arc::new(
            MemoryFeatureStore::new()
                .with_layer("shared", points_schema())
                .with_layer("second_only", points_schema()),
        );
        (first, second)
    }

    #[rstest]
    fn first_registered_store_wins(stores: (Arc<MemoryFeatureStore>, Arc<MemoryFeatureStore>)) {
        let (first, second) = stores;
        let router = LayerRouter::new()
            .with_store(Arc::clone(&first))
            .with_store(Arc::clone(&second));
        let point = crate::Feature::from_parts(
            Some(FeatureGeometry::new(Point::new(1.0, 1.0))),
            Vec::new(),
        );
        let created = router
            .write("shared", |store| store.create_feature(&point, "shared"))
            .expect("layer is routed");
        assert_eq!(created.expect("create succeeds"), 1);
        assert_eq!(first.feature_count("shared"), 1);
        assert_eq!(second.feature_count("shared"), 0);
    }

    #[rstest]
    fn later_store_serves_layers_the_first_lacks(
        stores: (Arc<MemoryFeatureStore>, Arc<MemoryFeatureStore>),
    ) {
        let (first, second) = stores;
        let router = LayerRouter::new().with_store(first).with_store(second);
        assert!(router.select("second_only").is_some());
        assert!(router.select("nowhere").is_none());
        assert!(router.read("nowhere", |_| ()).is_none());
    }

    #[rstest]
    fn lock_entries_live_only_while_held(
        stores: (Arc<MemoryFeatureStore>, Arc<MemoryFeatureStore>),
    ) {
        let (first, _) = stores;
        let router = LayerRouter::new().with_store(first);
        assert!(router.write("nowhere", |_| ()).is_none());
        assert_eq!(router.locks.len(), 0);

        let held = router
            .read("shared", |_| router.locks.len())
            .expect("layer is routed");
        assert_eq!(held, 1);
        assert_eq!(router.locks.len(), 0);
    }

    #[rstest]
    fn debug_lists_backends(stores: (Arc<MemoryFeatureStore>, Arc<MemoryFeatureStore>)) {
        let (first, _) = stores;
        let router = LayerRouter::new().with_store(first);
        assert!(format!("{router:?}").contains("memory"));
    }

    #[rstest]
    fn writers_on_one_layer_are_serialised() {
        let store = Arc::new(MemoryFeatureStore::new().with_layer("points", points_schema()));
        let router = Arc::new(LayerRouter::new().with_store(Arc::clone(&store)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let router = Arc::clone(&router);
                let in_flight = Arc::clone(&in_flight);
                let overlap = Arc::clone(&overlap);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    router.write("points", |store| {
                        if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(5));
                        let feature = crate::Feature::from_parts(
                            Some(FeatureGeometry::new(Point::new(0.0, 0.0))),
                            Vec::new(),
                        );
                        let id = store.create_feature(&feature, "points");
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        id
                    })
                })
            })
            .collect();
        let mut ids: Vec<FeatureId> = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("writer thread completes")
                    .expect("layer is routed")
                    .expect("create succeeds")
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
