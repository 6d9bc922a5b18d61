//! Derived, renderable geometry of map elements.
//!
//! Geometry is never the source of truth: it is recomputed from element
//! structure by a [`GeometryComputer`] whenever an element or one of the
//! elements it references changes.

mod areas;
mod creator;

pub use areas::is_area;
pub use creator::ElementGeometryCreator;

use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Rect};
use thiserror::Error;

use crate::{BoundingBox, Element, ElementKey, store::StoreError};

/// Shape of an element in WGS84 coordinates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementGeometry {
    /// Position of a node.
    Point(Point<f64>),
    /// Open or non-area way.
    Polyline(LineString<f64>),
    /// Area way or multipolygon relation.
    Polygons(MultiPolygon<f64>),
    /// Member geometries of a non-area relation.
    Cluster(Vec<ElementGeometry>),
}

impl ElementGeometry {
    /// Axis-aligned envelope in `geo` coordinates, if the geometry is not empty.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Point(point) => Some(point.bounding_rect()),
            Self::Polyline(line) => line.bounding_rect(),
            Self::Polygons(polygons) => polygons.bounding_rect(),
            Self::Cluster(members) => members
                .iter()
                .filter_map(Self::bounding_rect)
                .reduce(|acc, rect| {
                    Rect::new(
                        Coord {
                            x: acc.min().x.min(rect.min().x),
                            y: acc.min().y.min(rect.min().y),
                        },
                        Coord {
                            x: acc.max().x.max(rect.max().x),
                            y: acc.max().y.max(rect.max().y),
                        },
                    )
                }),
        }
    }

    /// Envelope as a [`BoundingBox`], if it is non-empty and within WGS84 range.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounding_rect()
            .and_then(|rect| BoundingBox::try_from(rect).ok())
    }

    /// Centre of the envelope.
    pub fn center(&self) -> Option<Coord<f64>> {
        self.bounding_rect().map(|rect| rect.center())
    }

    /// Whether the geometry intersects or lies within the box.
    ///
    /// Boundary contact counts as intersection.
    pub fn intersects(&self, bbox: &BoundingBox) -> bool {
        let rect = bbox.to_rect();
        match self {
            Self::Point(point) => point.intersects(&rect),
            Self::Polyline(line) => line.intersects(&rect),
            Self::Polygons(polygons) => polygons.intersects(&rect),
            Self::Cluster(members) => members.iter().any(|member| member.intersects(bbox)),
        }
    }
}

/// A geometry paired with the key of the element it belongs to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementGeometryEntry {
    /// Owning element.
    pub key: ElementKey,
    /// Derived geometry.
    pub geometry: ElementGeometry,
}

impl ElementGeometryEntry {
    /// Pair a key with its geometry.
    pub const fn new(key: ElementKey, geometry: ElementGeometry) -> Self {
        Self { key, geometry }
    }
}

/// Read access to elements while geometry is being computed.
///
/// Resolvers see the in-flight batch layered over the committed store.
pub trait ElementResolver {
    /// Find an element by key.
    fn resolve(&self, key: ElementKey) -> Result<Option<Element>, StoreError>;

    /// Position of the node with the given identifier.
    fn node_position(&self, id: i64) -> Result<Option<Coord<f64>>, StoreError> {
        Ok(match self.resolve(ElementKey::node(id))? {
            Some(Element::Node(node)) => Some(node.position),
            _ => None,
        })
    }
}

/// Errors raised while computing an element's geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A referenced node, way or member could not be resolved.
    #[error("geometry of {element} needs {missing}, which is not available")]
    MissingDependency {
        /// Element whose geometry was requested.
        element: ElementKey,
        /// Referenced element that is absent.
        missing: ElementKey,
    },
    /// The element's structure does not describe a usable shape.
    #[error("geometry of {element} is degenerate: {reason}")]
    Degenerate {
        /// Element whose geometry was requested.
        element: ElementKey,
        /// Human-readable description of the defect.
        reason: &'static str,
    },
    /// Resolving a dependency failed in the backing store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GeometryError {
    /// Whether the failure concerns only the one element.
    ///
    /// Store failures are not local and must abort the surrounding operation.
    pub const fn is_local(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Turns an element plus a view of the elements it references into geometry.
pub trait GeometryComputer: Send + Sync {
    /// Compute the geometry of `element`.
    ///
    /// `is_area` selects polygon output for closed ways and multipolygon
    /// relations.
    fn compute(
        &self,
        element: &Element,
        resolver: &dyn ElementResolver,
        is_area: bool,
    ) -> Result<ElementGeometry, GeometryError>;
}
