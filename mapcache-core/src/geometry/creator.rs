//! Default geometry computer for nodes, ways and relations.

use std::collections::VecDeque;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use log::debug;

use super::{ElementGeometry, ElementResolver, GeometryComputer, GeometryError};
use crate::{Element, ElementKey, ElementType, Relation, Way};

/// Builds point, polyline, polygon and cluster geometry from element structure.
///
/// Every referenced node must be resolvable; a single missing dependency
/// fails the element with [`GeometryError::MissingDependency`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementGeometryCreator;

impl GeometryComputer for ElementGeometryCreator {
    fn compute(
        &self,
        element: &Element,
        resolver: &dyn ElementResolver,
        is_area: bool,
    ) -> Result<ElementGeometry, GeometryError> {
        match element {
            Element::Node(node) => Ok(ElementGeometry::Point(Point::from(node.position))),
            Element::Way(way) => way_geometry(way, resolver, is_area),
            Element::Relation(relation) if is_area => area_relation_geometry(relation, resolver),
            Element::Relation(relation) => cluster_geometry(relation, resolver),
        }
    }
}

fn way_geometry(
    way: &Way,
    resolver: &dyn ElementResolver,
    is_area: bool,
) -> Result<ElementGeometry, GeometryError> {
    let key = ElementKey::way(way.id);
    let coords = way_positions(key, way, resolver)?;
    let Some(first) = coords.first() else {
        return Err(GeometryError::Degenerate {
            element: key,
            reason: "way has no nodes",
        });
    };
    if !coords.iter().skip(1).any(|coord| coord != first) {
        return Err(GeometryError::Degenerate {
            element: key,
            reason: "way needs at least two distinct positions",
        });
    }

    if is_area && way.is_closed() && coords.len() >= 4 {
        let polygon = Polygon::new(LineString::new(coords), Vec::new());
        Ok(ElementGeometry::Polygons(MultiPolygon::new(vec![polygon])))
    } else {
        Ok(ElementGeometry::Polyline(LineString::new(coords)))
    }
}

fn way_positions(
    owner: ElementKey,
    way: &Way,
    resolver: &dyn ElementResolver,
) -> Result<Vec<Coord<f64>>, GeometryError> {
    way.nodes
        .iter()
        .map(|&node_id| {
            resolver
                .node_position(node_id)?
                .ok_or(GeometryError::MissingDependency {
                    element: owner,
                    missing: ElementKey::node(node_id),
                })
        })
        .collect()
}

fn resolve_way(
    owner: ElementKey,
    way_id: i64,
    resolver: &dyn ElementResolver,
) -> Result<Way, GeometryError> {
    let missing = GeometryError::MissingDependency {
        element: owner,
        missing: ElementKey::way(way_id),
    };
    match resolver.resolve(ElementKey::way(way_id))? {
        Some(Element::Way(way)) => Ok(way),
        _ => Err(missing),
    }
}

fn area_relation_geometry(
    relation: &Relation,
    resolver: &dyn ElementResolver,
) -> Result<ElementGeometry, GeometryError> {
    let key = ElementKey::relation(relation.id);
    let mut outer = Vec::new();
    let mut inner = Vec::new();
    for member in &relation.members {
        if member.key.element_type != ElementType::Way {
            continue;
        }
        let way = resolve_way(key, member.key.id, resolver)?;
        let positions = way_positions(key, &way, resolver)?;
        match member.role.as_str() {
            "inner" => inner.push(positions),
            // Untagged members of multipolygons are treated as outer rings.
            "outer" | "" => outer.push(positions),
            _ => {}
        }
    }

    let mut polygons: Vec<Polygon<f64>> = assemble_rings(key, outer)?
        .into_iter()
        .map(|ring| Polygon::new(ring, Vec::new()))
        .collect();
    if polygons.is_empty() {
        return Err(GeometryError::Degenerate {
            element: key,
            reason: "area relation has no outer ring",
        });
    }

    for ring in assemble_rings(key, inner)? {
        let Some(&probe) = ring.0.first() else {
            continue;
        };
        match polygons.iter_mut().find(|polygon| polygon.contains(&probe)) {
            Some(polygon) => polygon.interiors_push(ring),
            None => debug!("dropping inner ring of {key} outside every outer ring"),
        }
    }

    Ok(ElementGeometry::Polygons(MultiPolygon::new(polygons)))
}

/// Join member way segments end to end into closed rings.
fn assemble_rings(
    element: ElementKey,
    segments: Vec<Vec<Coord<f64>>>,
) -> Result<Vec<LineString<f64>>, GeometryError> {
    let mut remaining: VecDeque<Vec<Coord<f64>>> = segments
        .into_iter()
        .filter(|segment| segment.len() >= 2)
        .collect();
    let mut rings = Vec::new();

    while let Some(mut ring) = remaining.pop_front() {
        loop {
            let (Some(&start), Some(&end)) = (ring.first(), ring.last()) else {
                break;
            };
            if start == end {
                break;
            }
            let next = remaining
                .iter()
                .position(|segment| segment.first() == Some(&end) || segment.last() == Some(&end))
                .and_then(|position| remaining.remove(position));
            let Some(mut next) = next else {
                return Err(GeometryError::Degenerate {
                    element,
                    reason: "member ways do not form closed rings",
                });
            };
            if next.first() != Some(&end) {
                next.reverse();
            }
            ring.extend(next.into_iter().skip(1));
        }
        if ring.len() < 4 {
            return Err(GeometryError::Degenerate {
                element,
                reason: "ring has fewer than four positions",
            });
        }
        rings.push(LineString::new(ring));
    }

    Ok(rings)
}

fn cluster_geometry(
    relation: &Relation,
    resolver: &dyn ElementResolver,
) -> Result<ElementGeometry, GeometryError> {
    let key = ElementKey::relation(relation.id);
    let mut members = Vec::with_capacity(relation.members.len());
    for member in &relation.members {
        match member.key.element_type {
            ElementType::Node => {
                let position = resolver.node_position(member.key.id)?.ok_or(
                    GeometryError::MissingDependency {
                        element: key,
                        missing: member.key,
                    },
                )?;
                members.push(ElementGeometry::Point(Point::from(position)));
            }
            ElementType::Way => {
                let way = resolve_way(key, member.key.id, resolver)?;
                let mut positions = way_positions(key, &way, resolver)?;
                match positions.len() {
                    0 => {}
                    1 => {
                        if let Some(position) = positions.pop() {
                            members.push(ElementGeometry::Point(Point::from(position)));
                        }
                    }
                    _ => members.push(ElementGeometry::Polyline(LineString::new(positions))),
                }
            }
            // Sub-relations are not expanded.
            ElementType::Relation => {}
        }
    }

    if members.is_empty() {
        return Err(GeometryError::Degenerate {
            element: key,
            reason: "relation has no node or way members",
        });
    }
    Ok(ElementGeometry::Cluster(members))
}
