//! Vector data structures: features, attribute values and feature sets.

mod bbox;

pub use bbox::BBox;

use geo::{BoundingRect, Centroid, Geometry, GeometryCollection, Point};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crs::Crs;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Nested arrays/objects, kept verbatim
    Json(serde_json::Value),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => AttributeValue::String(s),
            other => AttributeValue::Json(other),
        }
    }
}

impl From<AttributeValue> for serde_json::Value {
    fn from(value: AttributeValue) -> Self {
        use serde_json::Value;
        match value {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(b),
            AttributeValue::Int(i) => Value::from(i),
            AttributeValue::Float(f) => {
                serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
            }
            AttributeValue::String(s) => Value::String(s),
            AttributeValue::Json(v) => v,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, ordered by key
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Same feature with its geometry replaced
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: self.properties.clone(),
            id: self.id.clone(),
        }
    }
}

/// Ordered collection of features sharing one coordinate reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub crs: Crs,
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    /// Empty set in WGS84 degrees
    pub fn geographic() -> Self {
        Self::new(Crs::Geographic)
    }

    pub fn from_features(crs: Crs, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Iterate over the geometries that are present
    pub fn geometries(&self) -> impl Iterator<Item = &Geometry<f64>> {
        self.features.iter().filter_map(|f| f.geometry.as_ref())
    }

    /// Whether at least one feature carries a geometry
    pub fn has_geometry(&self) -> bool {
        self.geometries().next().is_some()
    }

    /// Centroid of all geometries taken together.
    ///
    /// Polygons dominate lines and lines dominate points, as for a union of
    /// the geometries. Returns `None` when nothing yields a finite centroid.
    pub fn centroid(&self) -> Option<Point<f64>> {
        let collection: GeometryCollection<f64> = self.geometries().cloned().collect();
        collection
            .centroid()
            .filter(|c| c.x().is_finite() && c.y().is_finite())
    }

    /// Features whose envelope touches `bbox`, in the set's own coordinates.
    ///
    /// Features without geometry are dropped.
    pub fn clip_to(&self, bbox: &BBox) -> FeatureSet {
        let features = self
            .features
            .iter()
            .filter(|f| {
                f.geometry
                    .as_ref()
                    .and_then(|g| g.bounding_rect())
                    .is_some_and(|rect| BBox::from(rect).intersects(bbox))
            })
            .cloned()
            .collect();
        FeatureSet::from_features(self.crs, features)
    }
}

impl IntoIterator for FeatureSet {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};

    #[test]
    fn test_attribute_json_round_trip() {
        let json = serde_json::json!({"a": 1, "b": 2.5, "c": "x", "d": null, "e": [1, 2]});
        let obj = json.as_object().unwrap();
        for (key, value) in obj {
            let attr = AttributeValue::from(value.clone());
            assert_eq!(serde_json::Value::from(attr), *value, "key {key}");
        }
        assert_eq!(AttributeValue::from(serde_json::json!(3)), AttributeValue::Int(3));
        assert_eq!(AttributeValue::Float(2.5).as_f64(), Some(2.5));
    }

    #[test]
    fn test_feature_properties() {
        let f = Feature::new(Point::new(1.0, 2.0))
            .with_property("use", "residential")
            .with_property("floor_count", 4_i64);
        assert_eq!(f.get_property("use").and_then(|v| v.as_str()), Some("residential"));
        assert_eq!(f.get_property("floor_count").and_then(|v| v.as_f64()), Some(4.0));
        assert!(f.get_property("missing").is_none());
    }

    #[test]
    fn test_centroid_of_polygons() {
        let mut set = FeatureSet::geographic();
        set.push(Feature::new(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ]));
        set.push(Feature::new(polygon![
            (x: 4.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 0.0)
        ]));
        let c = set.centroid().unwrap();
        assert!((c.x() - 3.0).abs() < 1e-12);
        assert!((c.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_to_keeps_touching_features() {
        let mut set = FeatureSet::geographic();
        set.push(Feature::new(LineString::from(vec![(0.0, 0.0), (2.0, 0.0)])));
        set.push(Feature::new(LineString::from(vec![(1.5, 1.5), (3.0, 3.0)])));
        set.push(Feature::new(Point::new(5.0, 5.0)));
        set.push(Feature::empty());

        let clipped = set.clip_to(&BBox::new(1.0, -1.0, 2.0, 2.0));
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped.features[..], set.features[..2]);
    }

    #[test]
    fn test_centroid_empty_and_geometryless() {
        assert!(FeatureSet::geographic().centroid().is_none());

        let mut set = FeatureSet::geographic();
        set.push(Feature::empty());
        assert!(!set.has_geometry());
        assert!(set.centroid().is_none());

        set.push(Feature::new(LineString::from(vec![(0.0, 0.0), (2.0, 0.0)])));
        let c = set.centroid().unwrap();
        assert!((c.x() - 1.0).abs() < 1e-12);
    }
}
