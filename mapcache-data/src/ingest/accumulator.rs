//! Internal accumulator for region reads from OpenStreetMap (OSM) PBF files.
//!
//! Pass one keeps the nodes inside the region together with every way and
//! relation. Ways touching a kept node survive, and the nodes they still
//! lack are collected by a second pass over the file.
use std::collections::{HashMap, HashSet};

use geo::Coord;
use log::warn;
use mapcache_core::{
    BoundingBox, Element as MapElement, ElementKey, ElementType, MapDataWithGeometry, Node,
    Relation, RelationMember, Way,
};
use osmpbf::{Element, RelMemberType};

use super::tags::collect_tags;
use super::{OsmReadReport, OsmReadSummary};

/// Identity and position shared by plain and dense nodes.
#[derive(Debug, Clone, Copy)]
struct NodeFields {
    id: i64,
    version: i32,
    lon: f64,
    lat: f64,
}

impl NodeFields {
    fn of(element: &Element<'_>) -> Option<Self> {
        match element {
            Element::Node(node) => Some(Self {
                id: node.id(),
                version: node.info().version().unwrap_or(1),
                lon: node.lon(),
                lat: node.lat(),
            }),
            Element::DenseNode(node) => Some(Self {
                id: node.id(),
                version: node.info().map_or(1, |info| info.version()),
                lon: node.lon(),
                lat: node.lat(),
            }),
            Element::Way(_) | Element::Relation(_) => None,
        }
    }

    fn position(self) -> Option<Coord<f64>> {
        validated_coord(self.lon, self.lat)
    }

    fn into_node<'a, T>(self, position: Coord<f64>, tags: T) -> Node
    where
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Node::new(self.id, self.version, position, collect_tags(tags))
    }
}

#[derive(Debug, Default)]
pub(super) struct RegionAccumulator {
    summary: OsmReadSummary,
    nodes: HashMap<i64, Node>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
    pending_nodes: HashSet<i64>,
    invalid_nodes: u64,
}

impl RegionAccumulator {
    pub(super) fn process_element(&mut self, element: Element<'_>, region: Option<&BoundingBox>) {
        match element {
            Element::Node(ref node) => {
                if let Some(fields) = NodeFields::of(&element) {
                    self.process_node(fields, node.tags(), region);
                }
            }
            Element::DenseNode(ref node) => {
                if let Some(fields) = NodeFields::of(&element) {
                    self.process_node(fields, node.tags(), region);
                }
            }
            Element::Way(way) => self.process_way(&way),
            Element::Relation(relation) => self.process_relation(&relation),
        }
    }

    fn process_node<'a, T>(&mut self, fields: NodeFields, tags: T, region: Option<&BoundingBox>)
    where
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let Some(position) = fields.position() else {
            self.invalid_nodes += 1;
            return;
        };
        self.summary.record_node(position);
        if region.is_none_or(|bbox| bbox.contains(position)) {
            self.nodes.insert(fields.id, fields.into_node(position, tags));
        }
    }

    fn process_way(&mut self, way: &osmpbf::Way<'_>) {
        self.summary.ways += 1;
        self.ways.push(Way::new(
            way.id(),
            way.info().version().unwrap_or(1),
            way.refs().collect(),
            collect_tags(way.tags()),
        ));
    }

    fn process_relation(&mut self, relation: &osmpbf::Relation<'_>) {
        self.summary.relations += 1;
        let members = relation
            .members()
            .map(|member| {
                let element_type = match member.member_type {
                    RelMemberType::Node => ElementType::Node,
                    RelMemberType::Way => ElementType::Way,
                    RelMemberType::Relation => ElementType::Relation,
                };
                RelationMember::new(
                    ElementKey::new(element_type, member.member_id),
                    member.role().unwrap_or_default(),
                )
            })
            .collect();
        self.relations.push(Relation::new(
            relation.id(),
            relation.info().version().unwrap_or(1),
            members,
            collect_tags(relation.tags()),
        ));
    }

    pub(super) fn combine(mut self, other: Self) -> Self {
        self.summary = self.summary.combine(other.summary);
        self.nodes.extend(other.nodes);
        self.ways.extend(other.ways);
        self.relations.extend(other.relations);
        self.invalid_nodes += other.invalid_nodes;
        self
    }

    /// Drop ways without a kept node and note the nodes the rest still need.
    pub(super) fn retain_region_ways(&mut self) {
        let nodes = &self.nodes;
        self.ways
            .retain(|way| way.nodes.iter().any(|id| nodes.contains_key(id)));
        self.pending_nodes = self
            .ways
            .iter()
            .flat_map(|way| way.nodes.iter().copied())
            .filter(|id| !nodes.contains_key(id))
            .collect();
    }

    pub(super) fn has_pending_nodes(&self) -> bool {
        !self.pending_nodes.is_empty()
    }

    pub(super) fn pending_node_count(&self) -> usize {
        self.pending_nodes.len()
    }

    pub(super) fn resolve_pending_element(&mut self, element: Element<'_>) {
        let Some(fields) = NodeFields::of(&element) else {
            return;
        };
        if !self.pending_nodes.contains(&fields.id) {
            return;
        }
        let Some(position) = fields.position() else {
            return;
        };
        self.pending_nodes.remove(&fields.id);
        let node = match element {
            Element::Node(ref node) => fields.into_node(position, node.tags()),
            Element::DenseNode(ref node) => fields.into_node(position, node.tags()),
            Element::Way(_) | Element::Relation(_) => return,
        };
        self.nodes.insert(node.id, node);
    }

    /// Keep relations reaching a kept element, directly or through kept
    /// sub-relations, and assemble the report.
    pub(super) fn into_report(self) -> OsmReadReport {
        if self.invalid_nodes > 0 {
            warn!(
                "Skipped {} nodes with invalid coordinates",
                self.invalid_nodes
            );
        }
        let mut kept: HashSet<ElementKey> = self
            .nodes
            .keys()
            .map(|id| ElementKey::node(*id))
            .chain(self.ways.iter().map(|way| ElementKey::way(way.id)))
            .collect();
        let mut remaining = self.relations;
        let mut relations = Vec::new();
        loop {
            let (matched, rest): (Vec<Relation>, Vec<Relation>) =
                remaining.into_iter().partition(|relation| {
                    relation
                        .members
                        .iter()
                        .any(|member| kept.contains(&member.key))
                });
            remaining = rest;
            if matched.is_empty() {
                break;
            }
            kept.extend(matched.iter().map(|relation| ElementKey::relation(relation.id)));
            relations.extend(matched);
        }

        let data = self
            .nodes
            .into_values()
            .map(MapElement::from)
            .chain(self.ways.into_iter().map(MapElement::from))
            .chain(relations.into_iter().map(MapElement::from))
            .collect::<MapDataWithGeometry>();
        OsmReadReport {
            summary: self.summary,
            data,
        }
    }
}

pub(super) fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapcache_core::Tags;
    use rstest::rstest;

    fn accumulator_with(nodes: &[(i64, f64, f64)], ways: Vec<Way>) -> RegionAccumulator {
        let mut accumulator = RegionAccumulator::default();
        for (id, x, y) in nodes {
            accumulator
                .nodes
                .insert(*id, Node::new(*id, 1, Coord { x: *x, y: *y }, Tags::new()));
        }
        accumulator.ways = ways;
        accumulator
    }

    #[rstest]
    #[case(0.0, 0.0, true)]
    #[case(180.0, -90.0, true)]
    #[case(180.5, 0.0, false)]
    #[case(0.0, f64::NAN, false)]
    fn coordinate_validation(#[case] lon: f64, #[case] lat: f64, #[case] valid: bool) {
        assert_eq!(validated_coord(lon, lat).is_some(), valid);
    }

    #[rstest]
    fn ways_outside_the_region_are_dropped() {
        let mut accumulator = accumulator_with(
            &[(1, 0.0, 0.0)],
            vec![
                Way::new(10, 1, vec![1, 2], Tags::new()),
                Way::new(11, 1, vec![3, 4], Tags::new()),
            ],
        );
        accumulator.retain_region_ways();

        let kept: Vec<_> = accumulator.ways.iter().map(|way| way.id).collect();
        assert_eq!(kept, [10]);
        assert_eq!(accumulator.pending_node_count(), 1);
    }

    #[rstest]
    fn relations_are_kept_through_sub_relations() {
        let mut accumulator = accumulator_with(&[(1, 0.0, 0.0)], Vec::new());
        accumulator.relations = vec![
            Relation::new(
                30,
                1,
                vec![RelationMember::new(ElementKey::relation(20), "")],
                Tags::new(),
            ),
            Relation::new(
                20,
                1,
                vec![RelationMember::new(ElementKey::node(1), "stop")],
                Tags::new(),
            ),
            Relation::new(
                40,
                1,
                vec![RelationMember::new(ElementKey::node(9), "")],
                Tags::new(),
            ),
        ];

        let report = accumulator.into_report();

        let ids: Vec<_> = report.data.relations().map(|relation| relation.id).collect();
        assert_eq!(ids, [20, 30]);
    }
}
