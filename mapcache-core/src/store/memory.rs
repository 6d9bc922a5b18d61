//! In-memory store implementations.

use std::collections::HashMap;

use rstar::{AABB, RTree, RTreeObject};

use super::{ElementStore, GeometryStore, StoreError};
use crate::{
    BoundingBox, Clock, Element, ElementGeometry, ElementGeometryEntry, ElementKey, Relation,
    SystemClock, Way,
};

#[derive(Debug, Clone)]
struct StoredElement {
    element: Element,
    last_sync: i64,
}

/// `HashMap`-backed [`ElementStore`].
///
/// Reverse lookups scan every element; the store suits tests and small
/// working sets.
pub struct MemoryElementStore {
    elements: HashMap<ElementKey, StoredElement>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for MemoryElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryElementStore")
            .field("elements", &self.elements.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryElementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryElementStore {
    /// Create an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            elements: HashMap::new(),
            clock: Box::new(clock),
        }
    }
}

impl ElementStore for MemoryElementStore {
    fn get(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        Ok(self.elements.get(&key).map(|stored| stored.element.clone()))
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<Element>, StoreError> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        Ok(keys
            .iter()
            .filter_map(|key| self.elements.get(key))
            .map(|stored| stored.element.clone())
            .collect())
    }

    fn get_ids_older_than(&self, timestamp: i64) -> Result<Vec<ElementKey>, StoreError> {
        let mut keys: Vec<_> = self
            .elements
            .iter()
            .filter(|(_, stored)| stored.last_sync < timestamp)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn ways_for_node(&self, node_id: i64) -> Result<Vec<Way>, StoreError> {
        let mut ways: Vec<Way> = self
            .elements
            .values()
            .filter_map(|stored| match &stored.element {
                Element::Way(way) if way.nodes.contains(&node_id) => Some(way.clone()),
                _ => None,
            })
            .collect();
        ways.sort_unstable_by_key(|way| way.id);
        Ok(ways)
    }

    fn relations_for_member(&self, key: ElementKey) -> Result<Vec<Relation>, StoreError> {
        let mut relations: Vec<Relation> = self
            .elements
            .values()
            .filter_map(|stored| match &stored.element {
                Element::Relation(relation)
                    if relation.members.iter().any(|member| member.key == key) =>
                {
                    Some(relation.clone())
                }
                _ => None,
            })
            .collect();
        relations.sort_unstable_by_key(|relation| relation.id);
        Ok(relations)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.elements.len())
    }

    fn put_all(&mut self, elements: &[Element]) -> Result<(), StoreError> {
        let last_sync = self.clock.now_millis();
        for element in elements {
            self.elements.insert(
                element.key(),
                StoredElement {
                    element: element.clone(),
                    last_sync,
                },
            );
        }
        Ok(())
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        Ok(keys
            .iter()
            .filter(|key| self.elements.remove(key).is_some())
            .count())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.elements.clear();
        Ok(())
    }
}

/// R\*-tree entry pointing at a stored geometry.
#[derive(Debug, Clone, PartialEq)]
struct IndexedGeometry {
    key: ElementKey,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedGeometry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(geometry: &ElementGeometry) -> Option<AABB<[f64; 2]>> {
    geometry
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

fn bbox_envelope(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [bbox.min_lon(), bbox.min_lat()],
        [bbox.max_lon(), bbox.max_lat()],
    )
}

/// [`GeometryStore`] keeping geometries in a `HashMap` with an R\*-tree of
/// their envelopes.
///
/// Box queries prefilter by envelope and then test the exact geometry.
#[derive(Debug, Default)]
pub struct MemoryGeometryStore {
    geometries: HashMap<ElementKey, ElementGeometry>,
    index: RTree<IndexedGeometry>,
}

impl MemoryGeometryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn remove(&mut self, key: ElementKey) -> bool {
        let Some(previous) = self.geometries.remove(&key) else {
            return false;
        };
        if let Some(envelope) = envelope_of(&previous) {
            self.index.remove(&IndexedGeometry { key, envelope });
        }
        true
    }

    fn locate(&self, bbox: &BoundingBox) -> Vec<(ElementKey, &ElementGeometry)> {
        let mut found: Vec<_> = self
            .index
            .locate_in_envelope_intersecting(&bbox_envelope(bbox))
            .filter_map(|indexed| {
                self.geometries
                    .get(&indexed.key)
                    .filter(|geometry| geometry.intersects(bbox))
                    .map(|geometry| (indexed.key, geometry))
            })
            .collect();
        found.sort_unstable_by_key(|(key, _)| *key);
        found
    }
}

impl GeometryStore for MemoryGeometryStore {
    fn get(&self, key: ElementKey) -> Result<Option<ElementGeometry>, StoreError> {
        Ok(self.geometries.get(&key).cloned())
    }

    fn get_all(&self, keys: &[ElementKey]) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                self.geometries
                    .get(&key)
                    .map(|geometry| ElementGeometryEntry::new(key, geometry.clone()))
            })
            .collect())
    }

    fn get_all_entries(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ElementGeometryEntry>, StoreError> {
        Ok(self
            .locate(bbox)
            .into_iter()
            .map(|(key, geometry)| ElementGeometryEntry::new(key, geometry.clone()))
            .collect())
    }

    fn get_all_keys(&self, bbox: &BoundingBox) -> Result<Vec<ElementKey>, StoreError> {
        Ok(self.locate(bbox).into_iter().map(|(key, _)| key).collect())
    }

    fn all_keys(&self) -> Result<Vec<ElementKey>, StoreError> {
        let mut keys: Vec<_> = self.geometries.keys().copied().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn put_all(&mut self, entries: &[ElementGeometryEntry]) -> Result<(), StoreError> {
        for entry in entries {
            self.remove(entry.key);
            if let Some(envelope) = envelope_of(&entry.geometry) {
                self.index.insert(IndexedGeometry {
                    key: entry.key,
                    envelope,
                });
            }
            self.geometries.insert(entry.key, entry.geometry.clone());
        }
        Ok(())
    }

    fn delete_all(&mut self, keys: &[ElementKey]) -> Result<usize, StoreError> {
        Ok(keys.iter().filter(|key| self.remove(**key)).count())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.geometries.clear();
        self.index = RTree::new();
        Ok(())
    }
}
