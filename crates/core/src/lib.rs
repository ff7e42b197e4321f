//! # Collage Core
//!
//! Core types, traits and I/O for Collage fragment operations.
//!
//! This crate provides:
//! - `Feature`, `FeatureSet`: vector features tagged with a coordinate reference
//! - `Fragment`: buildings, streets, tessellation and blocks of one area
//! - `Crs` and `LocalProjection`: the tangent-plane projection engine
//! - `Settings`: read-only configuration loaded from TOML
//! - Algorithm traits for consistent API
//! - GeoJSON interchange and fragment persistence

pub mod cancel;
pub mod config;
pub mod crs;
pub mod error;
pub mod fragment;
pub mod io;
pub mod vector;

pub use cancel::CancelToken;
pub use config::Settings;
pub use crs::{Crs, FrameTransform, LocalProjection, UtmZone};
pub use error::{Error, Result};
pub use fragment::{Fragment, FragmentMetadata, FragmentQuality};
pub use vector::{AttributeValue, BBox, Feature, FeatureSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::config::Settings;
    pub use crate::crs::{Crs, LocalProjection};
    pub use crate::error::{Error, Result};
    pub use crate::fragment::Fragment;
    pub use crate::vector::{AttributeValue, BBox, Feature, FeatureSet};
    pub use crate::Algorithm;
}

/// Core trait for all operations in Collage.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
