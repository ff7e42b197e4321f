//! # Collage Algorithms
//!
//! Spatial operations on Collage fragments.
//!
//! ## Available Algorithm Categories
//!
//! - **fragment**: Local projection, relocation, network merge
//! - **network**: Graph building, nearest-node lookup, isochrones
//! - **enrichment**: Building height cascade

pub mod enrichment;
pub mod fragment;
mod maybe_rayon;
pub mod network;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::enrichment::{enrich_heights, HeightReport};
    pub use crate::fragment::{
        derive_projection, ensure_projected, merge_networks, relocate, to_geographic,
        MergeNetworks, MergeParams, MergeReport, MergedNetwork, Relocate, RelocateParams,
        Relocation,
    };
    pub use crate::network::{
        build_graph, compute_isochrone, Graph, GraphParams, Isochrone, IsochroneHull,
        IsochroneParams, IsochroneResult,
    };
    pub use collage_core::prelude::*;
}
