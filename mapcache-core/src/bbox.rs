//! Rectangular query regions in geographic coordinates.

use std::str::FromStr;

use geo::{Coord, Rect};
use thiserror::Error;

/// A closed latitude/longitude rectangle used to scope geometry queries.
///
/// Antimeridian note: boxes crossing the antimeridian are not modelled.
/// Callers that need such regions split them into two boxes.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use mapcache_core::BoundingBox;
///
/// let bbox = BoundingBox::new(0.0, 1.0, 2.0, 3.0).expect("valid box");
/// assert!(bbox.contains(Coord { x: 1.0, y: 2.0 }));
/// assert!(!bbox.contains(Coord { x: 0.5, y: 1.0 }));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
}

/// Errors returned by [`BoundingBox::new`] and its parser.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundingBoxError {
    /// A coordinate was NaN or infinite.
    #[error("bounding box coordinates must be finite")]
    NonFinite,
    /// A latitude lay outside `[-90, 90]`.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    /// A longitude lay outside `[-180, 180]`.
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    /// The minimum corner lay above or right of the maximum corner.
    #[error("minimum corner must not exceed the maximum corner")]
    Inverted,
    /// Textual input did not contain four comma-separated numbers.
    #[error("expected `min_lat,min_lon,max_lat,max_lon`, found {0:?}")]
    Malformed(String),
}

impl BoundingBox {
    /// Validate and construct a bounding box.
    pub fn new(
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    ) -> Result<Self, BoundingBoxError> {
        let values = [min_lat, min_lon, max_lat, max_lon];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        for lat in [min_lat, max_lat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(BoundingBoxError::LatitudeOutOfRange(lat));
            }
        }
        for lon in [min_lon, max_lon] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(BoundingBoxError::LongitudeOutOfRange(lon));
            }
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(BoundingBoxError::Inverted);
        }
        Ok(Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })
    }

    /// Southern edge.
    pub const fn min_lat(&self) -> f64 {
        self.min_lat
    }

    /// Western edge.
    pub const fn min_lon(&self) -> f64 {
        self.min_lon
    }

    /// Northern edge.
    pub const fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Eastern edge.
    pub const fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// Convert to a `geo` rectangle with `x = longitude`, `y = latitude`.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_lon,
                y: self.min_lat,
            },
            Coord {
                x: self.max_lon,
                y: self.max_lat,
            },
        )
    }

    /// Whether the coordinate lies inside the box, boundary included.
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        (self.min_lon..=self.max_lon).contains(&coord.x)
            && (self.min_lat..=self.max_lat).contains(&coord.y)
    }

    /// Whether two boxes share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

impl TryFrom<Rect<f64>> for BoundingBox {
    type Error = BoundingBoxError;

    fn try_from(rect: Rect<f64>) -> Result<Self, Self::Error> {
        Self::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    }
}

impl From<BoundingBox> for Rect<f64> {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_rect()
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| BoundingBoxError::Malformed(value.to_owned()))?;
        match parts.as_slice() {
            [min_lat, min_lon, max_lat, max_lon] => {
                Self::new(*min_lat, *min_lon, *max_lat, *max_lon)
            }
            _ => Err(BoundingBoxError::Malformed(value.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(f64::NAN, 0.0, 1.0, 1.0, BoundingBoxError::NonFinite)]
    #[case(-91.0, 0.0, 1.0, 1.0, BoundingBoxError::LatitudeOutOfRange(-91.0))]
    #[case(0.0, 0.0, 1.0, 181.0, BoundingBoxError::LongitudeOutOfRange(181.0))]
    #[case(2.0, 0.0, 1.0, 1.0, BoundingBoxError::Inverted)]
    fn rejects_invalid_boxes(
        #[case] min_lat: f64,
        #[case] min_lon: f64,
        #[case] max_lat: f64,
        #[case] max_lon: f64,
        #[case] expected: BoundingBoxError,
    ) {
        assert_eq!(
            BoundingBox::new(min_lat, min_lon, max_lat, max_lon),
            Err(expected)
        );
    }

    #[rstest]
    #[case(Coord { x: 1.0, y: 0.0 })] // south-west corner
    #[case(Coord { x: 3.0, y: 2.0 })] // north-east corner
    #[case(Coord { x: 2.0, y: 1.0 })] // interior
    fn contains_boundary_and_interior(#[case] coord: Coord<f64>) {
        let bbox = BoundingBox::new(0.0, 1.0, 2.0, 3.0).expect("valid box");
        assert!(bbox.contains(coord));
    }

    #[rstest]
    fn converts_to_rect_with_lon_as_x() {
        let rect = BoundingBox::new(0.0, 1.0, 2.0, 3.0)
            .expect("valid box")
            .to_rect();
        assert_eq!(rect.min(), Coord { x: 1.0, y: 0.0 });
        assert_eq!(rect.max(), Coord { x: 3.0, y: 2.0 });
    }

    #[rstest]
    fn parses_comma_separated_corners() {
        let bbox: BoundingBox = "0, 1, 2, 3".parse().expect("parse box");
        assert_eq!(bbox, BoundingBox::new(0.0, 1.0, 2.0, 3.0).expect("valid box"));
    }

    #[rstest]
    #[case("0,1,2")]
    #[case("a,b,c,d")]
    fn rejects_malformed_text(#[case] text: &str) {
        assert!(matches!(
            text.parse::<BoundingBox>(),
            Err(BoundingBoxError::Malformed(_))
        ));
    }

    #[rstest]
    fn touching_boxes_intersect() {
        let left = BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box");
        let right = BoundingBox::new(0.0, 1.0, 1.0, 2.0).expect("valid box");
        let far = BoundingBox::new(5.0, 5.0, 6.0, 6.0).expect("valid box");
        assert!(left.intersects(&right));
        assert!(!left.intersects(&far));
    }
}
