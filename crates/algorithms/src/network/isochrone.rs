//! Walking-distance isochrones
//!
//! Snaps an origin onto the nearest graph node, runs Dijkstra bounded by a
//! distance cutoff and wraps the reachable nodes in their convex hull.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use collage_core::{
    Algorithm, AttributeValue, CancelToken, Error, Feature, FeatureSet, FrameTransform, Result,
    Settings,
};
use geo::{Area, ConvexHull, Coord, Geometry, Line, MultiPoint, Point, Polygon};
use tracing::{debug, info, warn};

use super::graph::Graph;
use super::kdtree::KdTree;
use super::node::NodeKey;

/// Cutoffs beyond this span more than a tangent plane should
const MAX_PLANAR_DISTANCE_M: f64 = 50_000.0;

/// Parameters for isochrone computation
#[derive(Debug, Clone)]
pub struct IsochroneParams {
    /// Distance cutoff along the network, inclusive (meters)
    pub max_distance_m: f64,
    /// Checked once per settled node
    pub cancel: Option<CancelToken>,
}

impl Default for IsochroneParams {
    fn default() -> Self {
        Self {
            max_distance_m: 800.0,
            cancel: None,
        }
    }
}

impl From<&Settings> for IsochroneParams {
    fn from(settings: &Settings) -> Self {
        Self {
            max_distance_m: settings.network.isochrone_max_distance_m,
            cancel: None,
        }
    }
}

/// A node with its geographic position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachableNode {
    pub key: NodeKey,
    pub point: Point<f64>,
    /// Shortest network distance from the origin node (meters)
    pub distance_m: f64,
}

/// Boundary of the reachable area, in WGS84
#[derive(Debug, Clone, PartialEq)]
pub enum IsochroneHull {
    Point(Point<f64>),
    /// Two reachable nodes, or all of them collinear
    Segment(Line<f64>),
    Polygon(Polygon<f64>),
}

impl IsochroneHull {
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            IsochroneHull::Point(p) => Geometry::Point(*p),
            IsochroneHull::Segment(l) => Geometry::Line(*l),
            IsochroneHull::Polygon(p) => Geometry::Polygon(p.clone()),
        }
    }
}

/// Outcome of an isochrone query
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneResult {
    /// Node the origin snapped to, `None` when no node was in range
    pub origin: Option<ReachableNode>,
    pub max_distance_m: f64,
    /// Sorted by distance, then key
    pub reachable: Vec<ReachableNode>,
    pub reachable_node_count: usize,
    pub hull: Option<IsochroneHull>,
}

impl IsochroneResult {
    fn empty(max_distance_m: f64) -> Self {
        Self {
            origin: None,
            max_distance_m,
            reachable: Vec::new(),
            reachable_node_count: 0,
            hull: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reachable.is_empty()
    }

    /// Hull followed by one point per reachable node, in WGS84
    pub fn to_feature_set(&self) -> FeatureSet {
        let mut set = FeatureSet::geographic();
        if let Some(hull) = &self.hull {
            set.push(
                Feature::new(hull.to_geometry())
                    .with_property("kind", "isochrone")
                    .with_property("max_distance_m", self.max_distance_m)
                    .with_property("reachable_node_count", self.reachable_node_count),
            );
        }
        for node in &self.reachable {
            set.push(
                Feature::new(node.point)
                    .with_property("kind", "node")
                    .with_property("distance_m", node.distance_m)
                    .with_property(
                        "node_key",
                        AttributeValue::Json(serde_json::json!([node.key.0, node.key.1])),
                    ),
            );
        }
        set
    }
}

/// Isochrone algorithm over a prebuilt graph
#[derive(Debug, Clone, Default)]
pub struct Isochrone;

impl Algorithm for Isochrone {
    type Input = (Graph, Point<f64>);
    type Output = IsochroneResult;
    type Params = IsochroneParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Isochrone"
    }

    fn description(&self) -> &'static str {
        "Nodes reachable within a network distance and their convex hull"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (graph, origin) = input;
        compute_isochrone(&graph, origin, &params)
    }
}

/// State in the priority queue (min-heap via reversed ordering).
///
/// Equal distances pop in key order so results never depend on
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    distance: f64,
    key: NodeKey,
    node: usize,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.key.cmp(&self.key))
    }
}

/// Nodes of `graph` reachable from `origin` within the cutoff.
///
/// `origin` is (lon, lat) in WGS84. It snaps to the nearest node (smallest
/// key on ties); when that node is farther than the cutoff, or the graph
/// has no nodes, the result is empty. Reachable positions and the hull are
/// returned in WGS84.
///
/// # Errors
/// - [`Error::InvalidParameter`] for a negative or non-finite cutoff
/// - [`Error::CrsMismatch`] when the graph frame has no conversion from WGS84
/// - [`Error::Cancelled`] when the cancel token fires mid-search
pub fn compute_isochrone(
    graph: &Graph,
    origin: Point<f64>,
    params: &IsochroneParams,
) -> Result<IsochroneResult> {
    let cutoff = params.max_distance_m;
    if !(cutoff.is_finite() && cutoff >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "max_distance_m",
            value: cutoff.to_string(),
            reason: "must be a non-negative number".into(),
        });
    }
    if cutoff > MAX_PLANAR_DISTANCE_M {
        warn!(
            "Isochrone cutoff {:.0} m exceeds {:.0} m; planar distances will drift",
            cutoff, MAX_PLANAR_DISTANCE_M
        );
    }

    if graph.is_empty() {
        debug!("Empty graph, no reachable nodes");
        return Ok(IsochroneResult::empty(cutoff));
    }

    let transform = graph.crs().transform()?;
    let q = transform.from_geographic(origin.0);

    let nodes = graph.nodes();
    let tree = KdTree::build(nodes);
    let Some(nearest) = tree.nearest(q.x, q.y) else {
        return Ok(IsochroneResult::empty(cutoff));
    };
    // Node positions only agree with a projected origin to within the
    // merge tolerance
    if nearest.distance() > cutoff + graph.tolerance() {
        debug!(
            "Nearest node is {:.1} m from the origin, beyond the {:.1} m cutoff",
            nearest.distance(),
            cutoff
        );
        return Ok(IsochroneResult::empty(cutoff));
    }
    let start = nearest.index;

    // Dijkstra
    let mut dist = vec![f64::INFINITY; nodes.len()];
    let mut settled = vec![false; nodes.len()];
    let mut order = Vec::new();
    let mut heap = BinaryHeap::new();

    dist[start] = 0.0;
    heap.push(State {
        distance: 0.0,
        key: nodes[start].key,
        node: start,
    });

    while let Some(State { distance, node, .. }) = heap.pop() {
        if settled[node] {
            continue;
        }
        if let Some(token) = &params.cancel {
            token.check()?;
        }
        settled[node] = true;
        order.push(node);

        for &(next, length) in graph.neighbors(node) {
            let candidate = distance + length;
            if candidate <= cutoff && candidate < dist[next] {
                dist[next] = candidate;
                heap.push(State {
                    distance: candidate,
                    key: nodes[next].key,
                    node: next,
                });
            }
        }
    }

    let to_reachable = |idx: usize| ReachableNode {
        key: nodes[idx].key,
        point: Point::from(transform.to_geographic(nodes[idx].coord)),
        distance_m: dist[idx],
    };
    let reachable: Vec<ReachableNode> = order.iter().map(|&idx| to_reachable(idx)).collect();
    let coords: Vec<Coord<f64>> = order.iter().map(|&idx| nodes[idx].coord).collect();
    let hull = hull_of(&coords, &transform);

    info!(
        "Isochrone {:.0} m: {} of {} nodes reachable",
        cutoff,
        reachable.len(),
        nodes.len()
    );

    Ok(IsochroneResult {
        origin: Some(to_reachable(start)),
        max_distance_m: cutoff,
        reachable_node_count: reachable.len(),
        reachable,
        hull,
    })
}

/// Convex hull of projected coordinates, degenerate cases reduced
fn hull_of(coords: &[Coord<f64>], transform: &FrameTransform) -> Option<IsochroneHull> {
    let to_geo = |c: Coord<f64>| transform.to_geographic(c);
    match coords {
        [] => None,
        [c] => Some(IsochroneHull::Point(Point::from(to_geo(*c)))),
        _ => {
            let hull = MultiPoint::from(coords.to_vec()).convex_hull();
            if hull.unsigned_area() > 0.0 {
                let ring = hull.exterior().0.iter().map(|&c| to_geo(c)).collect::<Vec<_>>();
                return Some(IsochroneHull::Polygon(Polygon::new(ring.into(), vec![])));
            }
            // Collinear: the lexicographic extremes are the segment ends
            let lexicographic = |a: &&Coord<f64>, b: &&Coord<f64>| {
                a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
            };
            let lo = coords.iter().min_by(lexicographic)?;
            let hi = coords.iter().max_by(lexicographic)?;
            if lo == hi {
                return Some(IsochroneHull::Point(Point::from(to_geo(*lo))));
            }
            Some(IsochroneHull::Segment(Line::new(to_geo(*lo), to_geo(*hi))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::{build_graph, GraphParams};
    use approx::assert_abs_diff_eq;
    use collage_core::{Crs, LocalProjection, UtmZone};
    use geo::LineString;

    fn frame() -> LocalProjection {
        LocalProjection::new(2.17, 41.39).unwrap()
    }

    fn graph(lines: &[&[(f64, f64)]]) -> Graph {
        let features = lines
            .iter()
            .map(|l| Feature::new(LineString::from(l.to_vec())))
            .collect();
        let set = FeatureSet::from_features(Crs::Local(frame()), features);
        build_graph(&set, &GraphParams::default()).unwrap()
    }

    fn at(x: f64, y: f64) -> Point<f64> {
        Point::from(frame().inverse(Coord { x, y }))
    }

    fn params(max_distance_m: f64) -> IsochroneParams {
        IsochroneParams {
            max_distance_m,
            cancel: None,
        }
    }

    #[test]
    fn test_path_distances() {
        let g = graph(&[
            &[(0.0, 0.0), (100.0, 0.0)],
            &[(100.0, 0.0), (250.0, 0.0)],
            &[(250.0, 0.0), (400.0, 0.0)],
        ]);
        let result = compute_isochrone(&g, at(1.0, 1.0), &params(300.0)).unwrap();

        let distances: Vec<f64> = result.reachable.iter().map(|n| n.distance_m).collect();
        assert_eq!(result.reachable_node_count, 3);
        assert_abs_diff_eq!(distances[0], 0.0);
        assert_abs_diff_eq!(distances[1], 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(distances[2], 250.0, epsilon = 1e-9);
        assert!(matches!(result.hull, Some(IsochroneHull::Segment(_))));
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let g = graph(&[&[(0.0, 0.0), (100.0, 0.0)]]);
        let result = compute_isochrone(&g, at(0.0, 0.0), &params(100.0)).unwrap();
        assert_eq!(result.reachable_node_count, 2);
    }

    #[test]
    fn test_zero_cutoff_gives_point_hull() {
        let g = graph(&[&[(0.0, 0.0), (100.0, 0.0)]]);
        let result = compute_isochrone(&g, at(0.0, 0.0), &params(0.0)).unwrap();
        assert_eq!(result.reachable_node_count, 1);
        let Some(IsochroneHull::Point(p)) = result.hull else {
            panic!("expected point hull");
        };
        assert_abs_diff_eq!(p.x(), 2.17, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y(), 41.39, epsilon = 1e-9);
    }

    #[test]
    fn test_origin_beyond_cutoff_is_empty() {
        let g = graph(&[&[(0.0, 0.0), (100.0, 0.0)]]);
        let result = compute_isochrone(&g, at(0.0, 500.0), &params(400.0)).unwrap();
        assert!(result.is_empty());
        assert!(result.origin.is_none());
        assert!(result.hull.is_none());
    }

    #[test]
    fn test_polygon_hull_is_geographic() {
        let g = graph(&[
            &[(0.0, 0.0), (100.0, 0.0)],
            &[(100.0, 0.0), (100.0, 100.0)],
            &[(0.0, 0.0), (0.0, 100.0)],
        ]);
        let result = compute_isochrone(&g, at(0.0, 0.0), &params(1000.0)).unwrap();
        let Some(IsochroneHull::Polygon(poly)) = &result.hull else {
            panic!("expected polygon hull");
        };
        for c in poly.exterior().coords() {
            assert!((c.x - 2.17).abs() < 0.01 && (c.y - 41.39).abs() < 0.01);
        }
        let features = result.to_feature_set();
        assert_eq!(features.len(), 1 + 4);
    }

    #[test]
    fn test_equal_distances_ordered_by_key() {
        let g = graph(&[&[(0.0, 0.0), (50.0, 0.0)], &[(0.0, 0.0), (-50.0, 0.0)]]);
        let result = compute_isochrone(&g, at(0.0, 0.0), &params(100.0)).unwrap();
        assert!(result.reachable[1].key < result.reachable[2].key);
        assert_eq!(result.reachable[1].distance_m, result.reachable[2].distance_m);
    }

    #[test]
    fn test_cancelled() {
        let g = graph(&[&[(0.0, 0.0), (100.0, 0.0)]]);
        let token = CancelToken::new();
        token.cancel();
        let p = IsochroneParams {
            max_distance_m: 800.0,
            cancel: Some(token),
        };
        assert!(matches!(
            compute_isochrone(&g, at(0.0, 0.0), &p),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_rejects_negative_cutoff() {
        let g = graph(&[&[(0.0, 0.0), (100.0, 0.0)]]);
        assert!(compute_isochrone(&g, at(0.0, 0.0), &params(-1.0)).is_err());
    }

    #[test]
    fn test_zero_cutoff_at_offset_node() {
        // A node away from the frame center does not round-trip exactly
        let g = graph(&[&[(3000.0, -2000.0), (3100.0, -2000.0)]]);
        let result = compute_isochrone(&g, at(3000.0, -2000.0), &params(0.0)).unwrap();
        assert_eq!(result.reachable_node_count, 1);
        assert_eq!(result.origin.map(|o| o.distance_m), Some(0.0));
    }

    #[test]
    fn test_utm_graph() {
        let zone = UtmZone::from_epsg(32631).unwrap();
        let (x, y) = (430_000.0, 4_580_000.0);
        let set = FeatureSet::from_features(
            Crs::Epsg(32631),
            vec![
                Feature::new(LineString::from(vec![(x, y), (x + 100.0, y)])),
                Feature::new(LineString::from(vec![(x + 100.0, y), (x + 100.0, y + 200.0)])),
            ],
        );
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        let origin = Point::from(zone.inverse(Coord { x: x + 1.0, y }));
        let result = compute_isochrone(&g, origin, &params(150.0)).unwrap();

        assert_eq!(result.reachable_node_count, 2);
        assert_abs_diff_eq!(result.reachable[1].distance_m, 100.0, epsilon = 1e-9);
        let expected = zone.inverse(Coord { x: x + 100.0, y });
        assert_abs_diff_eq!(result.reachable[1].point.x(), expected.x, epsilon = 1e-9);
        assert_abs_diff_eq!(result.reachable[1].point.y(), expected.y, epsilon = 1e-9);
    }

    #[test]
    fn test_foreign_frame_is_mismatch() {
        let set = FeatureSet::from_features(
            Crs::Epsg(3857),
            vec![Feature::new(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]))],
        );
        let g = build_graph(&set, &GraphParams::default()).unwrap();
        assert!(matches!(
            compute_isochrone(&g, Point::new(2.0, 41.0), &params(100.0)),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
