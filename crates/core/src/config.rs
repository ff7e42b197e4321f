//! # Configuration
//!
//! Parses `collage.toml`, the read-only settings and lookup tables shared by
//! every operation. Loaded once at startup and passed down by reference;
//! nothing here is mutated after loading. Every section and key is
//! optional and falls back to the defaults below.
//!
//! ```toml
//! [network]
//! snap_threshold_m = 50.0
//! isochrone_max_distance_m = 800.0
//! node_tolerance_m = 0.001
//!
//! [heights]
//! default_height_m = 9.0
//! default_floor_height_m = 3.0
//!
//! [heights.floor_heights]
//! residential = 3.0
//! office = 3.5
//!
//! [fragment_sizes]
//! small = 100
//! large = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level settings, parsed from `collage.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fragment: FragmentConfig,
    pub network: NetworkConfig,
    pub heights: HeightConfig,
    /// Building-count thresholds naming fragment sizes
    pub fragment_sizes: BTreeMap<String, usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fragment: FragmentConfig::default(),
            network: NetworkConfig::default(),
            heights: HeightConfig::default(),
            fragment_sizes: default_fragment_sizes(),
        }
    }
}

/// Extraction defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Context margin around a fragment's extent (meters)
    pub default_buffer_m: f64,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            default_buffer_m: 200.0,
        }
    }
}

/// Network merge and isochrone defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Endpoints closer than this are merged into one junction (meters)
    pub snap_threshold_m: f64,
    /// Default isochrone cutoff (meters)
    pub isochrone_max_distance_m: f64,
    /// Coordinates closer than this are the same graph node (meters)
    pub node_tolerance_m: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            snap_threshold_m: 50.0,
            isochrone_max_distance_m: 800.0,
            node_tolerance_m: 0.001,
        }
    }
}

/// Height cascade lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightConfig {
    /// Height assigned when nothing better is known (~3 floors)
    pub default_height_m: f64,
    /// Floor height for uses missing from `floor_heights`
    pub default_floor_height_m: f64,
    /// Floor height by building use
    pub floor_heights: BTreeMap<String, f64>,
}

impl HeightConfig {
    /// Floor height for a building use, falling back to the default
    pub fn floor_height(&self, building_use: Option<&str>) -> f64 {
        building_use
            .and_then(|u| self.floor_heights.get(u))
            .copied()
            .unwrap_or(self.default_floor_height_m)
    }
}

impl Default for HeightConfig {
    fn default() -> Self {
        let floor_heights = [
            ("residential", 3.0),
            ("apartments", 3.0),
            ("house", 3.0),
            ("detached", 3.0),
            ("commercial", 4.0),
            ("retail", 4.0),
            ("office", 3.5),
            ("industrial", 5.0),
            ("warehouse", 6.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            default_height_m: 9.0,
            default_floor_height_m: 3.0,
            floor_heights,
        }
    }
}

fn default_fragment_sizes() -> BTreeMap<String, usize> {
    [("small", 100), ("medium", 500), ("large", 2000), ("stress", 5000)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl Settings {
    /// Built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Smallest size class holding `buildings`, the largest class beyond
    /// every threshold, `None` with no classes configured
    pub fn size_class(&self, buildings: usize) -> Option<&str> {
        let mut classes: Vec<(&String, &usize)> = self.fragment_sizes.iter().collect();
        classes.sort_by_key(|(_, limit)| **limit);
        classes
            .iter()
            .find(|(_, limit)| buildings <= **limit)
            .or_else(|| classes.last())
            .map(|(name, _)| name.as_str())
    }

    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let settings = Self::from_toml_str(&text)?;
        tracing::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("network.snap_threshold_m", self.network.snap_threshold_m),
            ("network.isochrone_max_distance_m", self.network.isochrone_max_distance_m),
            ("network.node_tolerance_m", self.network.node_tolerance_m),
            ("heights.default_height_m", self.heights.default_height_m),
            ("heights.default_floor_height_m", self.heights.default_floor_height_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be a positive number".into(),
                });
            }
        }
        Ok(())
    }
}
