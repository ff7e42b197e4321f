//! Street network analysis
//!
//! - Node identity: tolerance-aware quantization of projected coordinates
//! - Graph: undirected, length-weighted graph from line features
//! - Isochrone: bounded Dijkstra from the node nearest an origin
//! - k-d tree: nearest-node lookup

mod graph;
mod isochrone;
pub mod kdtree;
mod node;

pub use graph::{build_graph, Edge, Graph, GraphParams};
#[cfg(test)]
pub(crate) use graph::line_length;
pub use isochrone::{
    compute_isochrone, Isochrone, IsochroneHull, IsochroneParams, IsochroneResult, ReachableNode,
};
pub use kdtree::{KdTree, NearestResult};
pub use node::{Node, NodeKey, NodeRegistry};
