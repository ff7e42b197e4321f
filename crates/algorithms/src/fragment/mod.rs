//! Fragment spatial operations
//!
//! - Projection: moving feature sets into and out of local metric frames
//! - Relocate: rigid move of a whole fragment to a new center
//! - Merge: combining a design network with its context network

mod merge;
mod projection;
mod relocate;

pub use merge::{merge_networks, MergeNetworks, MergeParams, MergeReport, MergedNetwork};
pub use projection::{derive_projection, ensure_projected, reproject_geometry, to_geographic};
pub use relocate::{relocate, Relocate, RelocateParams, Relocation};
