//! In-memory views of map data together with derived geometry.

use std::collections::{BTreeMap, HashMap};

use crate::{
    Element, ElementGeometry, ElementGeometryEntry, ElementKey, ElementResolver, ElementType,
    Node, Relation, Way, store::StoreError,
};

/// Nodes, ways and relations plus a geometry lookup keyed by element.
///
/// Instances are built fresh per query or notification and never persisted.
/// Elements are kept per type in identifier order; geometry may be absent
/// for elements whose shape could not be computed.
///
/// # Examples
/// ```
/// use geo::{Coord, Point};
/// use mapcache_core::{ElementGeometry, ElementKey, MapDataWithGeometry, Node, Tags};
///
/// let mut data = MapDataWithGeometry::default();
/// data.insert(Node::new(1, 1, Coord { x: 0.0, y: 0.0 }, Tags::new()).into());
/// data.insert_geometry(ElementKey::node(1), ElementGeometry::Point(Point::new(0.0, 0.0)));
///
/// assert_eq!(data.nodes().count(), 1);
/// assert!(data.geometry(ElementKey::node(1)).is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapDataWithGeometry {
    nodes: BTreeMap<i64, Node>,
    ways: BTreeMap<i64, Way>,
    relations: BTreeMap<i64, Relation>,
    geometries: HashMap<ElementKey, ElementGeometry>,
}

impl MapDataWithGeometry {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view from elements, without geometry.
    pub fn from_elements<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        let mut data = Self::default();
        for element in elements {
            data.insert(element);
        }
        data
    }

    /// Insert or replace an element, returning the replaced one.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        match element {
            Element::Node(node) => self.nodes.insert(node.id, node).map(Element::Node),
            Element::Way(way) => self.ways.insert(way.id, way).map(Element::Way),
            Element::Relation(relation) => self
                .relations
                .insert(relation.id, relation)
                .map(Element::Relation),
        }
    }

    /// Attach geometry to an element key.
    pub fn insert_geometry(&mut self, key: ElementKey, geometry: ElementGeometry) {
        self.geometries.insert(key, geometry);
    }

    /// Look up an element by key.
    pub fn get(&self, key: ElementKey) -> Option<Element> {
        match key.element_type {
            ElementType::Node => self.nodes.get(&key.id).cloned().map(Element::Node),
            ElementType::Way => self.ways.get(&key.id).cloned().map(Element::Way),
            ElementType::Relation => self.relations.get(&key.id).cloned().map(Element::Relation),
        }
    }

    /// Whether an element with the key is present.
    pub fn contains(&self, key: ElementKey) -> bool {
        match key.element_type {
            ElementType::Node => self.nodes.contains_key(&key.id),
            ElementType::Way => self.ways.contains_key(&key.id),
            ElementType::Relation => self.relations.contains_key(&key.id),
        }
    }

    /// Geometry attached to the key, if any.
    pub fn geometry(&self, key: ElementKey) -> Option<&ElementGeometry> {
        self.geometries.get(&key)
    }

    /// Nodes in identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ways in identifier order.
    pub fn ways(&self) -> impl Iterator<Item = &Way> {
        self.ways.values()
    }

    /// Relations in identifier order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Keys of all elements: nodes, then ways, then relations.
    pub fn keys(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.nodes
            .keys()
            .map(|&id| ElementKey::node(id))
            .chain(self.ways.keys().map(|&id| ElementKey::way(id)))
            .chain(self.relations.keys().map(|&id| ElementKey::relation(id)))
    }

    /// Owned copies of all elements: nodes, then ways, then relations.
    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.nodes
            .values()
            .cloned()
            .map(Element::Node)
            .chain(self.ways.values().cloned().map(Element::Way))
            .chain(self.relations.values().cloned().map(Element::Relation))
    }

    /// Geometry entries in element key order.
    pub fn geometry_entries(&self) -> Vec<ElementGeometryEntry> {
        self.keys()
            .filter_map(|key| {
                self.geometries
                    .get(&key)
                    .map(|geometry| ElementGeometryEntry::new(key, geometry.clone()))
            })
            .collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.relations.len()
    }

    /// Whether the view holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ElementResolver for MapDataWithGeometry {
    fn resolve(&self, key: ElementKey) -> Result<Option<Element>, StoreError> {
        Ok(self.get(key))
    }
}

impl FromIterator<Element> for MapDataWithGeometry {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self::from_elements(iter)
    }
}
