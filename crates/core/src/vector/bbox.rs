//! Geographic bounding boxes in `[west, south, east, north]` order.

use geo::{BoundingRect, Geometry, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Approximate meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Axis-aligned bounding box, serialized as `[west, south, east, north]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// Envelope of a set of geometries, `None` when there is none
    pub fn from_geometries<'a>(geoms: impl IntoIterator<Item = &'a Geometry<f64>>) -> Option<Self> {
        geoms
            .into_iter()
            .filter_map(|g| g.bounding_rect())
            .map(BBox::from)
            .reduce(|a, b| a.union(&b))
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// Grow a WGS84 box by roughly `buffer_m` meters on every side.
    ///
    /// Uses 111 320 m per degree of latitude and scales longitude by the
    /// cosine of the middle latitude; project first when accuracy matters.
    pub fn buffer_m(&self, buffer_m: f64) -> BBox {
        let lat_mid = (self.south + self.north) / 2.0;
        let dlat = buffer_m / METERS_PER_DEGREE;
        let dlon = buffer_m / (METERS_PER_DEGREE * lat_mid.to_radians().cos());

        BBox {
            west: self.west - dlon,
            south: self.south - dlat,
            east: self.east + dlon,
            north: self.north + dlat,
        }
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.west, self.south),
                (self.east, self.south),
                (self.east, self.north),
                (self.west, self.north),
                (self.west, self.south),
            ]),
            vec![],
        )
    }
}

impl From<Rect<f64>> for BBox {
    fn from(rect: Rect<f64>) -> Self {
        BBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.west, b.south, b.east, b.north]
    }
}

impl Default for BBox {
    fn default() -> Self {
        BBox::new(0.0, 0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_from_geometries() {
        let geoms = vec![
            Geometry::Point(Point::new(2.0, 41.0)),
            Geometry::Point(Point::new(2.5, 41.5)),
            Geometry::LineString(LineString::from(vec![(1.5, 41.2), (2.2, 42.0)])),
        ];
        let bb = BBox::from_geometries(&geoms).unwrap();
        assert_eq!(<[f64; 4]>::from(bb), [1.5, 41.0, 2.5, 42.0]);
        assert!(BBox::from_geometries(std::iter::empty()).is_none());
    }

    #[test]
    fn test_contains_and_intersects() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.contains_point(5.0, 5.0));
        assert!(!a.contains_point(15.0, 5.0));
        assert!(a.intersects(&BBox::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&BBox::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn test_buffer_m_at_equator() {
        let bb = BBox::new(0.0, -0.001, 0.001, 0.001).buffer_m(111.32);
        assert!((bb.south - (-0.002)).abs() < 1e-12);
        assert!((bb.east - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_m_widens_longitude_at_high_latitude() {
        let bb = BBox::new(10.0, 59.9, 10.1, 60.1).buffer_m(1000.0);
        let dlat = 59.9 - bb.south;
        let dlon = 10.0 - bb.west;
        // cos(60°) = 0.5 → twice as many degrees of longitude
        assert!((dlon / dlat - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_array_form() {
        let bb = BBox::new(2.15, 41.38, 2.17, 41.40);
        let json = serde_json::to_string(&bb).unwrap();
        assert_eq!(json, "[2.15,41.38,2.17,41.4]");
        let back: BBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bb);
    }

    #[test]
    fn test_to_polygon_closed_ring() {
        let poly = BBox::new(1.0, 2.0, 5.0, 8.0).to_polygon();
        let coords = &poly.exterior().0;
        assert_eq!(coords.len(), 5);
        assert_eq!(coords[0], coords[4]);
    }
}
