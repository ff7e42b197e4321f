//! Attribute enrichment for building layers

mod height;

pub use height::{enrich_heights, HeightReport, HeightSource};
