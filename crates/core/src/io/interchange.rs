//! GeoJSON interchange for feature sets.
//!
//! Coordinates are WGS84 lon/lat unless the collection carries a `"crs"`
//! foreign member naming another frame, either as a plain string or in the
//! legacy `{"type": "name", "properties": {"name": ...}}` form.

use geo::Geometry;
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureSet};

/// Convert a GeoJSON FeatureCollection into a feature set
pub fn feature_set_from_geojson(collection: geojson::FeatureCollection) -> Result<FeatureSet> {
    let crs = match collection.foreign_members.as_ref().and_then(|m| m.get("crs")) {
        Some(value) => crs_from_member(value)?,
        None => Crs::Geographic,
    };

    let features = collection
        .features
        .into_iter()
        .map(feature_from_geojson)
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureSet::from_features(crs, features))
}

/// Convert a feature set into a GeoJSON FeatureCollection
pub fn feature_set_to_geojson(set: &FeatureSet) -> geojson::FeatureCollection {
    let foreign_members = if set.crs.is_geographic() {
        None
    } else {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({"type": "name", "properties": {"name": set.crs.identifier()}}),
        );
        Some(members)
    };

    geojson::FeatureCollection {
        bbox: None,
        features: set.features.iter().map(feature_to_geojson).collect(),
        foreign_members,
    }
}

fn feature_from_geojson(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(Geometry::<f64>::try_from)
        .transpose()?;

    let properties: BTreeMap<String, AttributeValue> = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, AttributeValue::from(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn feature_to_geojson(feature: &Feature) -> geojson::Feature {
    let properties: JsonObject = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::from(v.clone())))
        .collect();

    geojson::Feature {
        bbox: None,
        geometry: feature
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: feature.id.clone().map(Id::String),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn crs_from_member(value: &JsonValue) -> Result<Crs> {
    let name = match value {
        JsonValue::String(s) => Some(s.as_str()),
        JsonValue::Object(obj) => obj
            .get("properties")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str()),
        _ => None,
    };
    name.ok_or_else(|| Error::Projection(format!("unreadable crs member: {}", value)))?
        .parse()
}

impl FeatureSet {
    /// Parse a GeoJSON document.
    ///
    /// A bare Feature or Geometry becomes a one-feature set.
    pub fn from_geojson_str(s: &str) -> Result<Self> {
        match s.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => feature_set_from_geojson(fc),
            GeoJson::Feature(f) => Ok(FeatureSet::from_features(
                Crs::Geographic,
                vec![feature_from_geojson(f)?],
            )),
            GeoJson::Geometry(g) => Ok(FeatureSet::from_features(
                Crs::Geographic,
                vec![Feature::new(Geometry::<f64>::try_from(g)?)],
            )),
        }
    }

    /// Serialize as a GeoJSON FeatureCollection string
    pub fn to_geojson_string(&self) -> String {
        GeoJson::FeatureCollection(feature_set_to_geojson(self)).to_string()
    }
}

impl Serialize for FeatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        feature_set_to_geojson(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let collection = geojson::FeatureCollection::deserialize(deserializer)?;
        feature_set_from_geojson(collection).map_err(D::Error::custom)
    }
}
