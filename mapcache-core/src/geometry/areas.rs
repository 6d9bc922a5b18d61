//! Tag heuristics deciding whether a closed way or a relation is an area.

use crate::{Element, Tags};

/// Keys whose presence on a closed way implies an area.
const AREA_KEYS: &[&str] = &[
    "aeroway",
    "amenity",
    "building",
    "building:part",
    "area:highway",
    "craft",
    "historic",
    "landuse",
    "leisure",
    "military",
    "office",
    "place",
    "public_transport",
    "shop",
    "tourism",
];

/// `natural=*` values that describe surfaces rather than lines.
const AREA_NATURAL_VALUES: &[&str] = &[
    "bare_rock",
    "beach",
    "glacier",
    "grassland",
    "heath",
    "sand",
    "scree",
    "scrub",
    "water",
    "wetland",
    "wood",
];

/// Whether the element should be rendered as a polygon.
///
/// Nodes are never areas. A way must be closed and carry area-implying tags;
/// `area=yes` and `area=no` override the heuristic. Relations are areas when
/// they are multipolygons or boundaries.
///
/// # Examples
/// ```
/// use mapcache_core::{Element, Tags, Way, is_area};
///
/// let tags = Tags::from([("building".to_owned(), "yes".to_owned())]);
/// let house = Element::from(Way::new(1, 1, vec![1, 2, 3, 1], tags.clone()));
/// let open = Element::from(Way::new(2, 1, vec![1, 2, 3], tags));
/// assert!(is_area(&house));
/// assert!(!is_area(&open));
/// ```
pub fn is_area(element: &Element) -> bool {
    match element {
        Element::Node(_) => false,
        Element::Way(way) => way.is_closed() && tags_imply_area(&way.tags),
        Element::Relation(relation) => matches!(
            relation.tags.get("type").map(String::as_str),
            Some("multipolygon" | "boundary")
        ),
    }
}

fn tags_imply_area(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("yes") => return true,
        Some("no") => return false,
        _ => {}
    }
    if AREA_KEYS.iter().any(|key| tags.contains_key(*key)) {
        return true;
    }
    tags.get("natural")
        .is_some_and(|value| AREA_NATURAL_VALUES.contains(&value.as_str()))
}
