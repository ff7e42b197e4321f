//! Weighted street graph built from line features
//!
//! Each line becomes one undirected edge between its two endpoints, weighted
//! by the full length of the line in the projected frame. Intermediate
//! vertices are not nodes.

use collage_core::{Crs, FeatureSet, Result, Settings};
use geo::{Geometry, LineString};
use tracing::{debug, info};

use super::node::{Node, NodeRegistry};
use crate::fragment::ensure_projected;

/// Parameters for graph construction
#[derive(Debug, Clone)]
pub struct GraphParams {
    /// Coordinates closer than this are one node (meters)
    pub node_tolerance_m: f64,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            node_tolerance_m: 0.001,
        }
    }
}

impl From<&Settings> for GraphParams {
    fn from(settings: &Settings) -> Self {
        Self {
            node_tolerance_m: settings.network.node_tolerance_m,
        }
    }
}

/// An undirected edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    /// Length of the underlying line (meters)
    pub length: f64,
    /// Index of the feature the line came from
    pub feature: usize,
}

/// Undirected street graph in a projected frame
#[derive(Debug, Clone)]
pub struct Graph {
    crs: Crs,
    tolerance: f64,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Per node: (neighbor, edge length)
    adjacency: Vec<Vec<(usize, f64)>>,
    skipped_features: usize,
}

impl Graph {
    fn empty(crs: Crs, tolerance: f64, skipped_features: usize) -> Self {
        Self {
            crs,
            tolerance,
            nodes: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            skipped_features,
        }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Neighbors of a node with the length of the connecting edge
    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Features that produced no edge (non-line or degenerate geometry)
    pub fn skipped_features(&self) -> usize {
        self.skipped_features
    }

    /// Sum of all edge lengths (meters)
    pub fn total_length(&self) -> f64 {
        self.edges.iter().map(|e| e.length).sum()
    }
}

/// Planar length of a line string
pub(crate) fn line_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

/// Build a graph from the line features of `set`.
///
/// Geographic input is projected into a local frame centered on its
/// centroid first. LineStrings give one edge each, MultiLineStrings one
/// edge per part. Other features are skipped and counted.
///
/// An empty set, or one with no geometry at all, gives an empty graph.
pub fn build_graph(set: &FeatureSet, params: &GraphParams) -> Result<Graph> {
    let mut registry = NodeRegistry::new(params.node_tolerance_m)?;

    if !set.has_geometry() {
        return Ok(Graph::empty(set.crs, params.node_tolerance_m, set.len()));
    }

    let projected = ensure_projected(set, None)?;

    let mut edges = Vec::new();
    let mut skipped = 0;
    for (feature_idx, feature) in projected.iter().enumerate() {
        let lines: Vec<&LineString<f64>> = match &feature.geometry {
            Some(Geometry::LineString(ls)) => vec![ls],
            Some(Geometry::MultiLineString(mls)) => mls.0.iter().collect(),
            _ => Vec::new(),
        };

        let mut added = false;
        for line in lines {
            let (Some(&start), Some(&end)) = (line.0.first(), line.0.last()) else {
                continue;
            };
            if line.0.len() < 2 {
                continue;
            }
            let from = registry.resolve(start);
            let to = registry.resolve(end);
            edges.push(Edge {
                from,
                to,
                length: line_length(line),
                feature: feature_idx,
            });
            added = true;
        }
        if !added {
            skipped += 1;
        }
    }

    let nodes = registry.into_nodes();
    let mut adjacency = vec![Vec::new(); nodes.len()];
    for edge in &edges {
        adjacency[edge.from].push((edge.to, edge.length));
        if edge.to != edge.from {
            adjacency[edge.to].push((edge.from, edge.length));
        }
    }

    if skipped > 0 {
        debug!("Skipped {} features without line geometry", skipped);
    }
    info!(
        "Built graph: {} nodes, {} edges from {} features",
        nodes.len(),
        edges.len(),
        set.len()
    );

    Ok(Graph {
        crs: projected.crs,
        tolerance: params.node_tolerance_m,
        nodes,
        edges,
        adjacency,
        skipped_features: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use collage_core::{Feature, LocalProjection};
    use geo::{MultiLineString, Point};

    fn local() -> Crs {
        Crs::Local(LocalProjection::new(2.17, 41.39).unwrap())
    }

    fn line(coords: &[(f64, f64)]) -> Feature {
        Feature::new(LineString::from(coords.to_vec()))
    }

    #[test]
    fn test_shared_endpoints_share_nodes() {
        let set = FeatureSet::from_features(
            local(),
            vec![
                line(&[(0.0, 0.0), (100.0, 0.0)]),
                line(&[(100.0, 0.0), (100.0, 100.0)]),
                // within 1 mm of the first end
                line(&[(100.0004, 100.0), (0.0, 100.0)]),
            ],
        );
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.neighbors(1).len(), 2);
        assert_eq!(g.crs(), &local());
    }

    #[test]
    fn test_edge_weight_is_full_line_length() {
        let set = FeatureSet::from_features(
            local(),
            vec![line(&[(0.0, 0.0), (30.0, 40.0), (30.0, 100.0)])],
        );
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        // Intermediate vertex is not a node
        assert_eq!(g.node_count(), 2);
        assert_relative_eq!(g.edges()[0].length, 110.0, epsilon = 1e-9);
    }

    #[test]
    fn test_multilinestring_parts_and_skips() {
        let multi = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(20.0, 0.0), (30.0, 0.0)]),
        ]);
        let set = FeatureSet::from_features(
            local(),
            vec![
                Feature::new(multi),
                Feature::new(Point::new(5.0, 5.0)),
                Feature::empty(),
            ],
        );
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.skipped_features(), 2);
        assert_relative_eq!(g.total_length(), 20.0);
    }

    #[test]
    fn test_empty_set_gives_empty_graph() {
        let g = build_graph(&FeatureSet::geographic(), &GraphParams::default()).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_geographic_input_is_projected() {
        let mut set = FeatureSet::geographic();
        set.push(line(&[(2.1700, 41.3900), (2.1710, 41.3900)]));
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        assert!(g.crs().local().is_some());
        // 0.001° of longitude at 41.39°N
        assert_relative_eq!(g.edges()[0].length, 83.64, epsilon = 0.05);
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        let params = GraphParams {
            node_tolerance_m: -1.0,
        };
        assert!(build_graph(&FeatureSet::geographic(), &params).is_err());
    }
}
