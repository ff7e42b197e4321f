//! Building height cascade
//!
//! Each building gets a `height_m` and a `height_source` from the first
//! tier that applies:
//!
//! 1. `osm_tag`: an existing height attribute, in meters
//! 2. `osm_levels`: `floor_count` × the floor height for the building `use`
//! 3. `type_default`: the configured default height
//!
//! An existing height keeps the `height_source` it arrived with, so a second
//! pass changes nothing and heights from other providers stay attributed.
//! Only `osm_levels` heights are recomputed from the current floor heights.

use collage_core::config::HeightConfig;
use collage_core::{AttributeValue, Feature, FeatureSet};
use serde::Serialize;
use tracing::info;

use crate::maybe_rayon::*;

/// Tier a height came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeightSource {
    OsmTag,
    OsmLevels,
    TypeDefault,
    /// Another provider's label, e.g. `overture`
    Provided(String),
}

impl HeightSource {
    pub fn as_str(&self) -> &str {
        match self {
            HeightSource::OsmTag => "osm_tag",
            HeightSource::OsmLevels => "osm_levels",
            HeightSource::TypeDefault => "type_default",
            HeightSource::Provided(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "osm_tag" => HeightSource::OsmTag,
            "osm_levels" => HeightSource::OsmLevels,
            "type_default" => HeightSource::TypeDefault,
            other => HeightSource::Provided(other.to_string()),
        }
    }
}

/// Per-tier counts of an enrichment run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeightReport {
    pub buildings: usize,
    /// Existing heights, tagged or from another provider
    pub from_tag: usize,
    pub from_levels: usize,
    pub defaulted: usize,
    /// Share of buildings with a non-default height, 0 when there are none
    pub coverage: f64,
}

/// Assign `height_m` and `height_source` to every building.
///
/// Returns a new feature set; attributes other than the two height keys
/// are untouched.
pub fn enrich_heights(buildings: &FeatureSet, config: &HeightConfig) -> (FeatureSet, HeightReport) {
    let enriched: Vec<(Feature, HeightSource)> = buildings
        .features
        .par_iter()
        .map(|feature| {
            let (height, source) = resolve_height(feature, config);
            let feature = feature
                .clone()
                .with_property("height_m", height)
                .with_property("height_source", source.as_str());
            (feature, source)
        })
        .collect();

    let mut report = HeightReport {
        buildings: enriched.len(),
        ..HeightReport::default()
    };
    for (_, source) in &enriched {
        match source {
            HeightSource::OsmTag | HeightSource::Provided(_) => report.from_tag += 1,
            HeightSource::OsmLevels => report.from_levels += 1,
            HeightSource::TypeDefault => report.defaulted += 1,
        }
    }
    if report.buildings > 0 {
        report.coverage = (report.buildings - report.defaulted) as f64 / report.buildings as f64;
    }

    info!(
        "Height enrichment: {} buildings, {:.1}% non-default",
        report.buildings,
        report.coverage * 100.0
    );

    let features = enriched.into_iter().map(|(f, _)| f).collect();
    (FeatureSet::from_features(buildings.crs, features), report)
}

fn resolve_height(feature: &Feature, config: &HeightConfig) -> (f64, HeightSource) {
    let existing = feature.get_property("height_m").and_then(parse_meters);
    let source = feature
        .get_property("height_source")
        .and_then(AttributeValue::as_str)
        .map(HeightSource::from_label);

    let floors = feature
        .get_property("floor_count")
        .and_then(parse_meters)
        .filter(|f| *f >= 1.0);
    let from_levels = |floors: f64| {
        let building_use = feature.get_property("use").and_then(AttributeValue::as_str);
        (floors * config.floor_height(building_use), HeightSource::OsmLevels)
    };

    match (existing, source) {
        (Some(h), Some(HeightSource::OsmLevels)) => match floors {
            Some(floors) => from_levels(floors),
            None => (h, HeightSource::OsmLevels),
        },
        (Some(h), Some(source)) => (h, source),
        (Some(h), None) => (h, HeightSource::OsmTag),
        (None, _) => match floors {
            Some(floors) => from_levels(floors),
            None => (config.default_height_m, HeightSource::TypeDefault),
        },
    }
}

/// Positive number from a numeric attribute or a tag such as `"12.5 m"`
fn parse_meters(value: &AttributeValue) -> Option<f64> {
    let v = match value {
        AttributeValue::String(s) => s.trim().trim_end_matches('m').trim().parse().ok()?,
        other => other.as_f64()?,
    };
    (v.is_finite() && v > 0.0).then_some(v)
}
