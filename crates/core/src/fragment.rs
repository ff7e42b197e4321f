//! Fragments: bundled feature sets plus provenance metadata.
//!
//! A fragment is the unit of extraction, relocation, merge input and
//! persistence. It serializes to the FragmentPackage JSON shape:
//!
//! ```json
//! { "metadata": {...}, "buildings": {...}, "streets": {...},
//!   "tessellation": {...}, "blocks": {...}, "metrics": null }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::vector::{BBox, FeatureSet};

/// Quality flags recorded at extraction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentQuality {
    pub building_completeness: f64,
    pub height_coverage: f64,
    pub street_network_connected: bool,
    pub tessellation_success: bool,
}

impl Default for FragmentQuality {
    fn default() -> Self {
        Self {
            building_completeness: 0.0,
            height_coverage: 0.0,
            street_network_connected: false,
            tessellation_success: false,
        }
    }
}

/// Provenance and summary of a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentMetadata {
    pub id: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub extracted_at: Option<DateTime<Utc>>,
    pub crs: String,
    pub bbox: BBox,
    pub data_sources: Vec<String>,
    pub building_count: usize,
    pub street_segment_count: usize,
    pub tessellation_cell_count: usize,
    pub quality: FragmentQuality,
}

impl Default for FragmentMetadata {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            city: String::new(),
            country: String::new(),
            extracted_at: None,
            crs: "EPSG:4326".to_string(),
            bbox: BBox::default(),
            data_sources: Vec::new(),
            building_count: 0,
            street_segment_count: 0,
            tessellation_cell_count: 0,
            quality: FragmentQuality::default(),
        }
    }
}

/// Buildings, streets, tessellation and blocks of one geographic area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fragment {
    pub metadata: FragmentMetadata,
    pub buildings: FeatureSet,
    pub streets: FeatureSet,
    pub tessellation: FeatureSet,
    pub blocks: FeatureSet,
    /// Pre-computed metric profile, opaque to the core
    pub metrics: Option<serde_json::Value>,
}

impl Fragment {
    /// Fragment holding only buildings, other layers empty
    pub fn from_buildings(buildings: FeatureSet) -> Self {
        let mut fragment = Self {
            buildings,
            ..Self::default()
        };
        fragment.refresh_summary();
        fragment
    }

    /// Mutable access to every layer, in a fixed order
    pub fn layers_mut(&mut self) -> [(&'static str, &mut FeatureSet); 4] {
        [
            ("buildings", &mut self.buildings),
            ("streets", &mut self.streets),
            ("tessellation", &mut self.tessellation),
            ("blocks", &mut self.blocks),
        ]
    }

    /// Every layer, in a fixed order
    pub fn layers(&self) -> [(&'static str, &FeatureSet); 4] {
        [
            ("buildings", &self.buildings),
            ("streets", &self.streets),
            ("tessellation", &self.tessellation),
            ("blocks", &self.blocks),
        ]
    }

    /// Envelope of the buildings grown by `buffer_m` on every side.
    ///
    /// `None` unless the buildings are in WGS84 and have geometry.
    pub fn context_extent(&self, buffer_m: f64) -> Option<BBox> {
        if self.buildings.crs != Crs::Geographic {
            return None;
        }
        BBox::from_geometries(self.buildings.geometries()).map(|bbox| bbox.buffer_m(buffer_m))
    }

    /// Recompute counts, bbox and crs in the metadata from the layers.
    ///
    /// The bbox is taken from the buildings; it is left untouched when
    /// there are no building geometries.
    pub fn refresh_summary(&mut self) {
        self.metadata.building_count = self.buildings.len();
        self.metadata.street_segment_count = self.streets.len();
        self.metadata.tessellation_cell_count = self.tessellation.len();
        self.metadata.crs = self.buildings.crs.identifier();
        if let Some(bbox) = BBox::from_geometries(self.buildings.geometries()) {
            self.metadata.bbox = bbox;
        }
    }
}
