//! The single writer of the element and geometry stores.
//!
//! Every mutation is turned into one [`Batch`] (geometry deletes, element
//! deletes, element upserts, geometry upserts) and committed while holding
//! the store write lock. Listeners are notified after the lock is released,
//! still inside the mutation mutex, so notification order equals commit
//! order and callbacks may read from the controller.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    BoundingBox, Element, ElementGeometry, ElementGeometryCreator, ElementGeometryEntry,
    ElementKey, ElementResolver, ElementStore, ElementType, ElementUpdates, GeometryComputer,
    GeometryError, GeometryStore, InvalidUpdateError, MapDataListener, MapDataWithGeometry,
    Relation, StoreError, Way, is_area, listener::ListenerRegistry,
};

/// Errors surfaced by [`MapDataController`] operations.
///
/// A failed mutation leaves the stores as they were before the call.
#[derive(Debug, Error)]
pub enum MapDataError {
    /// A store operation failed; the mutation was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The update was rejected before touching storage.
    #[error("invalid update: {0}")]
    InvalidUpdate(#[from] InvalidUpdateError),
    /// Geometry entries exist without their element.
    #[error("{} geometry entries have no element, starting with {}", .keys.len(), first_key(.keys))]
    OrphanGeometry {
        /// Keys of the orphaned geometry entries.
        keys: Vec<ElementKey>,
    },
    /// A mutation failed and restoring the previous state failed as well.
    #[error("mutation failed ({cause}) and rollback failed: {rollback}")]
    RollbackFailed {
        /// Failure that aborted the mutation.
        #[source]
        cause: StoreError,
        /// Failure raised while restoring the previous state.
        rollback: StoreError,
    },
    /// A previous operation panicked while holding a controller lock.
    #[error("map data controller lock poisoned")]
    Poisoned,
}

fn first_key(keys: &[ElementKey]) -> String {
    keys.first().map_or_else(String::new, ToString::to_string)
}

struct Stores<E, G> {
    elements: E,
    geometries: G,
}

/// Changes committed together.
#[derive(Debug, Default)]
struct Batch {
    geometry_deletes: Vec<ElementKey>,
    element_deletes: Vec<ElementKey>,
    elements: Vec<Element>,
    geometries: Vec<ElementGeometryEntry>,
}

impl Batch {
    fn touched_elements(&self) -> Vec<ElementKey> {
        union(
            &self.element_deletes,
            &self.elements.iter().map(Element::key).collect::<Vec<_>>(),
        )
    }

    fn touched_geometries(&self) -> Vec<ElementKey> {
        union(
            &self.geometry_deletes,
            &self
                .geometries
                .iter()
                .map(|entry| entry.key)
                .collect::<Vec<_>>(),
        )
    }
}

/// Records touched by a batch as they were before it was applied.
struct Snapshot {
    element_keys: Vec<ElementKey>,
    geometry_keys: Vec<ElementKey>,
    elements: Vec<Element>,
    geometries: Vec<ElementGeometryEntry>,
}

impl Snapshot {
    fn capture<E: ElementStore, G: GeometryStore>(
        stores: &Stores<E, G>,
        batch: &Batch,
    ) -> Result<Self, StoreError> {
        let element_keys = batch.touched_elements();
        let geometry_keys = batch.touched_geometries();
        Ok(Self {
            elements: stores.elements.get_all(&element_keys)?,
            geometries: stores.geometries.get_all(&geometry_keys)?,
            element_keys,
            geometry_keys,
        })
    }

    fn restore<E: ElementStore, G: GeometryStore>(
        &self,
        stores: &mut Stores<E, G>,
    ) -> Result<(), StoreError> {
        stores.geometries.delete_all(&self.geometry_keys)?;
        stores.elements.delete_all(&self.element_keys)?;
        stores.elements.put_all(&self.elements)?;
        stores.geometries.put_all(&self.geometries)
    }
}

/// Keys of `first` followed by the keys of `second` not already listed.
fn union(first: &[ElementKey], second: &[ElementKey]) -> Vec<ElementKey> {
    let mut seen = HashSet::with_capacity(first.len() + second.len());
    first
        .iter()
        .chain(second)
        .copied()
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Committed elements overlaid with the batch being prepared.
struct StagedResolver<'a, E> {
    staged: HashMap<ElementKey, &'a Element>,
    hidden: HashSet<ElementKey>,
    store: &'a E,
}

impl<'a, E: ElementStore> StagedResolver<'a, E> {
    fn new(
        staged: impl IntoIterator<Item = &'a Element>,
        hidden: &[ElementKey],
        store: &'a E,
    ) -> Self {
        Self {
            staged: staged
                .into_iter()
                .map(|element| (element.key(), element))
                .collect(),
            hidden: hidden.iter().copied().collect(),
            store,
        }
    }
}

impl<E: ElementStore> ElementResolver for StagedResolver<'_, E> {
    fn resolve(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        if let Some(element) = self.staged.get(&key) {
            return Ok(Some((*element).clone()));
        }
        if self.hidden.contains(&key) {
            return Ok(None);
        }
        self.store.get(key)
    }
}

/// Geometry computed for a set of elements.
#[derive(Debug, Default)]
struct Computed {
    entries: Vec<ElementGeometryEntry>,
    failed: Vec<ElementKey>,
}

/// Owns all mutation of the element and geometry stores and tells
/// registered listeners exactly what changed.
///
/// Reads may run concurrently with each other. Mutations are serialised and
/// appear atomic to readers.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use geo::Coord;
/// use mapcache_core::{
///     BoundingBox, ElementKey, ElementUpdates, MapDataController, MemoryElementStore,
///     MemoryGeometryStore, Node, Tags,
/// };
///
/// let controller = MapDataController::new(MemoryElementStore::new(), MemoryGeometryStore::new());
/// let node = Node::new(1, 1, Coord { x: 13.4, y: 52.5 }, Tags::new());
/// controller.update_all(&ElementUpdates::new(vec![node.into()], Vec::new(), Vec::new()))?;
///
/// let bbox = BoundingBox::new(52.0, 13.0, 53.0, 14.0)?;
/// let data = controller.get_map_data_with_geometry(&bbox)?;
/// assert!(data.geometry(ElementKey::node(1)).is_some());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MapDataController<E, G, C = ElementGeometryCreator> {
    stores: RwLock<Stores<E, G>>,
    mutation: Mutex<()>,
    listeners: ListenerRegistry,
    computer: C,
}

impl<E, G, C> fmt::Debug for MapDataController<E, G, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapDataController")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<E: ElementStore, G: GeometryStore> MapDataController<E, G> {
    /// Create a controller computing geometry with [`ElementGeometryCreator`].
    pub fn new(elements: E, geometries: G) -> Self {
        Self::with_computer(elements, geometries, ElementGeometryCreator)
    }
}

impl<E, G, C> MapDataController<E, G, C>
where
    E: ElementStore,
    G: GeometryStore,
    C: GeometryComputer,
{
    /// Create a controller with a custom geometry computer.
    pub fn with_computer(elements: E, geometries: G, computer: C) -> Self {
        Self {
            stores: RwLock::new(Stores {
                elements,
                geometries,
            }),
            mutation: Mutex::new(()),
            listeners: ListenerRegistry::default(),
            computer,
        }
    }

    /// Register a listener; notifications follow registration order.
    pub fn add_listener(&self, listener: Arc<dyn MapDataListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a listener by identity, reporting whether it was found.
    pub fn remove_listener(&self, listener: &Arc<dyn MapDataListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Stores<E, G>>, MapDataError> {
        self.stores.read().map_err(|_| MapDataError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Stores<E, G>>, MapDataError> {
        self.stores.write().map_err(|_| MapDataError::Poisoned)
    }

    fn lock_mutation(&self) -> Result<MutexGuard<'_, ()>, MapDataError> {
        self.mutation.lock().map_err(|_| MapDataError::Poisoned)
    }

    /// Fetch one element.
    pub fn get(&self, key: ElementKey) -> Result<Option<Element>, MapDataError> {
        Ok(self.read()?.elements.get(key)?)
    }

    /// Fetch one element's geometry.
    pub fn get_geometry(&self, key: ElementKey) -> Result<Option<ElementGeometry>, MapDataError> {
        Ok(self.read()?.geometries.get(key)?)
    }

    /// Fetch the elements among `keys` that exist.
    pub fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, MapDataError> {
        Ok(self.read()?.elements.get_all(keys)?)
    }

    /// Fetch the geometry entries among `keys` that exist.
    pub fn get_geometries(
        &self,
        keys: &[ElementKey],
    ) -> Result<Vec<ElementGeometryEntry>, MapDataError> {
        Ok(self.read()?.geometries.get_all(keys)?)
    }

    /// Ways referencing the node.
    pub fn get_ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, MapDataError> {
        Ok(self.read()?.elements.ways_for_node(node_id)?)
    }

    /// Relations listing the element as a member.
    pub fn get_relations_for_element(
        &self,
        key: ElementKey,
    ) -> Result<Vec<Relation>, MapDataError> {
        Ok(self.read()?.elements.relations_for_member(key)?)
    }

    /// Elements whose geometry intersects `bbox`, with that geometry.
    ///
    /// Geometry entries whose element no longer exists are left out.
    pub fn get_map_data_with_geometry(
        &self,
        bbox: &BoundingBox,
    ) -> Result<MapDataWithGeometry, MapDataError> {
        let stores = self.read()?;
        let entries = stores.geometries.get_all_entries(bbox)?;
        let keys: Vec<_> = entries.iter().map(|entry| entry.key).collect();
        let mut data = MapDataWithGeometry::from_elements(stores.elements.get_all(&keys)?);
        drop(stores);

        let mut stale = 0_usize;
        for entry in entries {
            if data.contains(entry.key) {
                data.insert_geometry(entry.key, entry.geometry);
            } else {
                stale += 1;
            }
        }
        if stale > 0 {
            warn!("ignored {stale} geometry entries without an element in {bbox:?}");
        }
        Ok(data)
    }

    /// Apply a local edit or an upload response.
    ///
    /// Deleted keys and the old keys of id updates are removed and updated
    /// elements are upserted. Geometry is recomputed for the updated
    /// elements and for every stored way or relation whose shape depends on
    /// them, including relations that only reach a changed node through one
    /// of their member ways. Listeners receive one `on_updated` call listing
    /// the removed keys.
    ///
    /// # Errors
    /// Returns [`MapDataError::InvalidUpdate`] before touching storage when
    /// `updates` is inconsistent, and a store error if the commit fails.
    pub fn update_all(&self, updates: &ElementUpdates) -> Result<(), MapDataError> {
        updates.validate()?;
        let _mutation = self.lock_mutation()?;
        let deleted = updates.effective_deleted_keys();

        let mut stores = self.write()?;
        let resolver = StagedResolver::new(&updates.updated, &deleted, &stores.elements);
        let mut computed = self.compute(&updates.updated, &resolver)?;

        let changed: Vec<ElementKey> = updates
            .updated
            .iter()
            .map(Element::key)
            .chain(deleted.iter().copied())
            .collect();
        let dependents = find_dependents(&stores.elements, &changed)?;
        let dependent_geometry = self.compute(&dependents, &resolver)?;
        computed.entries.extend(dependent_geometry.entries);
        computed.failed.extend(dependent_geometry.failed);
        drop(resolver);

        debug!(
            "update_all: {} updated, {} deleted, {} dependents, {} without geometry",
            updates.updated.len(),
            deleted.len(),
            dependents.len(),
            computed.failed.len()
        );
        let batch = Batch {
            geometry_deletes: union(&deleted, &computed.failed),
            element_deletes: deleted.clone(),
            elements: updates.updated.clone(),
            geometries: computed.entries,
        };
        commit(&mut stores, &batch)?;
        drop(stores);

        let mut data =
            MapDataWithGeometry::from_elements(updates.updated.iter().cloned().chain(dependents));
        for entry in batch.geometries {
            data.insert_geometry(entry.key, entry.geometry);
        }
        self.listeners
            .dispatch(|listener| listener.on_updated(&data, &deleted));
        Ok(())
    }

    /// Remove every element last written before `timestamp` (epoch ms),
    /// returning how many were removed.
    pub fn delete_older_than(&self, timestamp: i64) -> Result<usize, MapDataError> {
        let _mutation = self.lock_mutation()?;
        let mut stores = self.write()?;
        let keys = stores.elements.get_ids_older_than(timestamp)?;
        debug!("delete_older_than({timestamp}): {} elements", keys.len());
        let batch = Batch {
            geometry_deletes: keys.clone(),
            element_deletes: keys,
            ..Batch::default()
        };
        commit(&mut stores, &batch)?;
        drop(stores);

        let deleted = batch.element_deletes;
        self.listeners.dispatch(|listener| {
            listener.on_updated(&MapDataWithGeometry::default(), &deleted);
        });
        Ok(deleted.len())
    }

    /// Replace everything inside `bbox` with `data`.
    ///
    /// Elements previously stored with geometry in `bbox` but absent from
    /// `data` are removed. Geometry supplied in `data` is used as is; missing
    /// geometry is computed. Listeners receive one `on_replaced_for_bbox`
    /// call carrying `data` with geometry attached.
    pub fn put_all_for_bbox(
        &self,
        bbox: &BoundingBox,
        mut data: MapDataWithGeometry,
    ) -> Result<(), MapDataError> {
        let _mutation = self.lock_mutation()?;
        let mut stores = self.write()?;

        let previous = stores.geometries.get_all_keys(bbox)?;
        let obsolete: Vec<ElementKey> = previous
            .into_iter()
            .filter(|key| !data.contains(*key))
            .collect();

        let elements: Vec<Element> = data.elements().collect();
        let (supplied, missing): (Vec<&Element>, Vec<&Element>) = elements
            .iter()
            .partition(|element| data.geometry(element.key()).is_some());
        let resolver = StagedResolver::new(&elements, &obsolete, &stores.elements);
        let computed = self.compute(missing, &resolver)?;
        drop(resolver);

        let mut geometries: Vec<ElementGeometryEntry> = supplied
            .into_iter()
            .filter_map(|element| {
                data.geometry(element.key())
                    .map(|geometry| ElementGeometryEntry::new(element.key(), geometry.clone()))
            })
            .collect();
        geometries.extend(computed.entries);

        debug!(
            "put_all_for_bbox({bbox:?}): {} elements, {} obsolete, {} without geometry",
            elements.len(),
            obsolete.len(),
            computed.failed.len()
        );
        let batch = Batch {
            geometry_deletes: union(&obsolete, &computed.failed),
            element_deletes: obsolete,
            elements,
            geometries,
        };
        commit(&mut stores, &batch)?;
        drop(stores);

        for entry in batch.geometries {
            data.insert_geometry(entry.key, entry.geometry);
        }
        self.listeners
            .dispatch(|listener| listener.on_replaced_for_bbox(bbox, &data));
        Ok(())
    }

    /// Empty both stores.
    pub fn clear(&self) -> Result<(), MapDataError> {
        let _mutation = self.lock_mutation()?;
        let mut stores = self.write()?;
        stores.geometries.clear()?;
        stores.elements.clear()?;
        drop(stores);
        debug!("cleared map data");
        self.listeners.dispatch(|listener| listener.on_cleared());
        Ok(())
    }

    /// Verify that every geometry entry belongs to a stored element.
    ///
    /// # Errors
    /// Returns [`MapDataError::OrphanGeometry`] listing the offending keys.
    pub fn check_integrity(&self) -> Result<(), MapDataError> {
        let stores = self.read()?;
        let keys = stores.geometries.all_keys()?;
        let present: HashSet<ElementKey> = stores
            .elements
            .get_all(&keys)?
            .iter()
            .map(Element::key)
            .collect();
        let orphans: Vec<_> = keys
            .into_iter()
            .filter(|key| !present.contains(key))
            .collect();
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(MapDataError::OrphanGeometry { keys: orphans })
        }
    }

    fn compute<'e>(
        &self,
        elements: impl IntoIterator<Item = &'e Element>,
        resolver: &dyn ElementResolver,
    ) -> Result<Computed, StoreError> {
        let mut computed = Computed::default();
        for element in elements {
            match self.computer.compute(element, resolver, is_area(element)) {
                Ok(geometry) => computed
                    .entries
                    .push(ElementGeometryEntry::new(element.key(), geometry)),
                Err(GeometryError::Store(error)) => return Err(error),
                Err(error) => {
                    warn!("{error}");
                    computed.failed.push(element.key());
                }
            }
        }
        Ok(computed)
    }
}

/// Stored ways and relations whose shape depends on one of `changed`,
/// excluding `changed` itself.
///
/// Relations are reached through changed members and through the ways
/// found for changed nodes. Relations are never expanded further.
fn find_dependents<E: ElementStore>(
    store: &E,
    changed: &[ElementKey],
) -> Result<Vec<Element>, StoreError> {
    let excluded: HashSet<ElementKey> = changed.iter().copied().collect();
    let mut found: BTreeMap<ElementKey, Element> = BTreeMap::new();
    let mut pending: Vec<ElementKey> = changed.to_vec();
    while let Some(key) = pending.pop() {
        if key.element_type == ElementType::Node {
            for way in store.ways_for_node(key.id)? {
                let way_key = ElementKey::way(way.id);
                if !excluded.contains(&way_key) && !found.contains_key(&way_key) {
                    pending.push(way_key);
                }
                found.insert(way_key, way.into());
            }
        }
        // Sub-relations do not contribute geometry.
        if key.element_type != ElementType::Relation {
            for relation in store.relations_for_member(key)? {
                found.insert(ElementKey::relation(relation.id), relation.into());
            }
        }
    }
    found.retain(|key, _| !excluded.contains(key));
    Ok(found.into_values().collect())
}

fn apply<E: ElementStore, G: GeometryStore>(
    stores: &mut Stores<E, G>,
    batch: &Batch,
) -> Result<(), StoreError> {
    stores.geometries.delete_all(&batch.geometry_deletes)?;
    stores.elements.delete_all(&batch.element_deletes)?;
    stores.elements.put_all(&batch.elements)?;
    stores.geometries.put_all(&batch.geometries)
}

/// Apply `batch`, restoring the previous records if any step fails.
fn commit<E: ElementStore, G: GeometryStore>(
    stores: &mut Stores<E, G>,
    batch: &Batch,
) -> Result<(), MapDataError> {
    let snapshot = Snapshot::capture(stores, batch)?;
    let Err(cause) = apply(stores, batch) else {
        return Ok(());
    };
    warn!("rolling back failed batch: {cause}");
    match snapshot.restore(stores) {
        Ok(()) => Err(MapDataError::Store(cause)),
        Err(rollback) => Err(MapDataError::RollbackFailed { cause, rollback }),
    }
}
