//! Merging a design street network into its context
//!
//! Both networks are brought into one metric frame. Context endpoints near
//! a design endpoint snap onto it, turning it into a shared junction. Any
//! edge that passes close to a junction without ending there is split at
//! its closest point and, when needed, joined to the junction by a short
//! connector edge. Every input feature is accounted for in the output.

use std::collections::BTreeSet;

use collage_core::{Algorithm, Crs, Error, Feature, FeatureSet, Result, Settings};
use geo::{Coord, Geometry, LineString};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use tracing::{debug, info};

use super::projection::{derive_projection, ensure_projected, to_geographic};
use crate::network::{KdTree, NodeRegistry};

/// Parameters for network merging
#[derive(Debug, Clone)]
pub struct MergeParams {
    /// Endpoints and edges closer than this to a junction join it (meters)
    pub snap_threshold_m: f64,
    /// Coordinates closer than this are the same node (meters)
    pub node_tolerance_m: f64,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            snap_threshold_m: 50.0,
            node_tolerance_m: 0.001,
        }
    }
}

impl From<&Settings> for MergeParams {
    fn from(settings: &Settings) -> Self {
        Self {
            snap_threshold_m: settings.network.snap_threshold_m,
            node_tolerance_m: settings.network.node_tolerance_m,
        }
    }
}

/// What happened to each input during a merge.
///
/// `output_features = design_features + context_features + exploded_parts
/// + (split_pieces - split_edges) + connectors`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub design_features: usize,
    pub context_features: usize,
    /// Extra edges gained by exploding multi-part lines
    pub exploded_parts: usize,
    /// Context endpoints moved onto a design endpoint
    pub snapped_endpoints: usize,
    /// Two-point context edges reaching one design node with both ends,
    /// joined at the nearer end only
    pub kept_far_ends: usize,
    /// Design endpoints shared with the context
    pub junctions: usize,
    pub split_edges: usize,
    pub split_pieces: usize,
    pub connectors: usize,
    /// Non-line or degenerate features copied as-is
    pub passed_through: usize,
    pub output_features: usize,
}

/// Merged network in the shared frame
#[derive(Debug, Clone, PartialEq)]
pub struct MergedNetwork {
    pub network: FeatureSet,
    pub report: MergeReport,
}

/// Network merge algorithm
#[derive(Debug, Clone, Default)]
pub struct MergeNetworks;

impl Algorithm for MergeNetworks {
    type Input = (FeatureSet, FeatureSet);
    type Output = MergedNetwork;
    type Params = MergeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MergeNetworks"
    }

    fn description(&self) -> &'static str {
        "Merge design and context street networks with endpoint snapping and edge splitting"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (design, context) = input;
        merge_networks(&design, &context, &params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Design,
    Context,
}

impl Side {
    fn tag(self) -> &'static str {
        match self {
            Side::Design => "design",
            Side::Context => "context",
        }
    }
}

/// A line taking part in snapping and splitting
#[derive(Debug, Clone)]
struct LineEdge {
    side: Side,
    /// Index of the input feature within its network
    parent: usize,
    /// Part number when exploded from a multi-part line
    multipart: Option<usize>,
    template: Feature,
    line: LineString<f64>,
    /// Context edge with an endpoint on a junction
    joined: bool,
}

/// Output slot, in input order
enum Item {
    Edge(usize),
    Pass(Side, Feature),
}

/// Position of a split along an edge
#[derive(Debug, Clone, Copy)]
struct SplitPoint {
    segment: usize,
    t: f64,
    coord: Coord<f64>,
    junction: Coord<f64>,
}

/// Edge bounding box for the R-tree prefilter
struct IndexedEdge {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl MergeParams {
    fn validate(&self) -> Result<()> {
        if !(self.snap_threshold_m.is_finite() && self.snap_threshold_m >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "snap_threshold_m",
                value: self.snap_threshold_m.to_string(),
                reason: "must be a non-negative number".into(),
            });
        }
        // Tolerance is checked by the node registry
        Ok(())
    }
}

/// Merge `context` into `design`.
///
/// The result is expressed in the shared frame: the local projection of
/// whichever input is already local, otherwise one derived from the
/// centroid of both inputs. Two inputs in the same foreign EPSG frame are
/// merged in that frame.
///
/// Output features carry `source` (`design`, `context` or `merged`) and
/// `origin` (the input network, or `connector`). Split pieces also carry
/// `parent` (input feature index) and `part`.
///
/// # Errors
/// - [`Error::CrsMismatch`] when the inputs cannot share one frame
/// - [`Error::InvalidParameter`] for a bad threshold or tolerance
pub fn merge_networks(
    design: &FeatureSet,
    context: &FeatureSet,
    params: &MergeParams,
) -> Result<MergedNetwork> {
    params.validate()?;
    let mut registry = NodeRegistry::new(params.node_tolerance_m)?;
    let tol = params.node_tolerance_m;
    let threshold = params.snap_threshold_m;

    let mut report = MergeReport {
        design_features: design.len(),
        context_features: context.len(),
        ..MergeReport::default()
    };
    if design.is_empty() && context.is_empty() {
        return Ok(MergedNetwork {
            network: FeatureSet::new(design.crs),
            report,
        });
    }

    let (design, context) = reconcile(design, context)?;
    let frame = design.crs;

    let mut edges = Vec::new();
    let mut items = Vec::new();
    collect_lines(&design, Side::Design, &mut edges, &mut items, &mut report);
    collect_lines(&context, Side::Context, &mut edges, &mut items, &mut report);

    // Endpoint snapping
    for edge in edges.iter().filter(|e| e.side == Side::Design) {
        registry.resolve(edge.line.0[0]);
        registry.resolve(edge.line.0[edge.line.0.len() - 1]);
    }
    let tree = KdTree::build(registry.nodes());
    let mut junctions = BTreeSet::new();

    for edge in edges.iter_mut().filter(|e| e.side == Side::Context) {
        let last = edge.line.0.len() - 1;
        let mut hits = [0, last].map(|end| {
            let c = edge.line.0[end];
            tree.nearest(c.x, c.y).filter(|n| n.distance() <= threshold)
        });

        // A two-point edge with both ends on one design node would collapse
        // to a point: only the nearer end joins, the far end stays put.
        let far = match &hits {
            [Some(a), Some(b)] if last == 1 && a.index == b.index => {
                Some(if b.distance() < a.distance() { 0 } else { 1 })
            }
            _ => None,
        };
        if let Some(far) = far {
            hits[far] = None;
            report.kept_far_ends += 1;
        }

        for (end, hit) in [0, last].into_iter().zip(hits) {
            let Some(nearest) = hit else {
                continue;
            };
            junctions.insert(nearest.index);
            edge.joined = true;
            if edge.line.0[end] != nearest.node.coord {
                edge.line.0[end] = nearest.node.coord;
                report.snapped_endpoints += 1;
            }
        }
    }
    report.junctions = junctions.len();

    // Edge splitting
    let index = RTree::bulk_load(
        edges
            .iter()
            .enumerate()
            .map(|(index, e)| IndexedEdge {
                index,
                envelope: envelope(&e.line),
            })
            .collect(),
    );
    let mut splits: Vec<Vec<SplitPoint>> = vec![Vec::new(); edges.len()];

    for &j in &junctions {
        let junction = registry.node(j).coord;
        let query = AABB::from_corners(
            [junction.x - threshold, junction.y - threshold],
            [junction.x + threshold, junction.y + threshold],
        );
        let mut candidates: Vec<usize> = index
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.index)
            .collect();
        candidates.sort_unstable();

        for i in candidates {
            let line = &edges[i].line;
            let (start, end) = (line.0[0], line.0[line.0.len() - 1]);
            if distance(start, junction) <= tol || distance(end, junction) <= tol {
                continue;
            }
            let Some(split) = closest_point(line, junction) else {
                continue;
            };
            if distance(split.coord, junction) > threshold
                || distance(split.coord, start) <= tol
                || distance(split.coord, end) <= tol
            {
                continue;
            }
            splits[i].push(split);
        }
    }

    // Assemble output in input order, connectors last
    let mut features = Vec::new();
    let mut connectors = Vec::new();

    for item in items {
        match item {
            Item::Pass(side, mut feature) => {
                feature.set_property("source", side.tag());
                feature.set_property("origin", side.tag());
                features.push(feature);
            }
            Item::Edge(i) => {
                let edge = &edges[i];
                let points = std::mem::take(&mut splits[i]);
                if points.is_empty() {
                    let source = if edge.joined { "merged" } else { edge.side.tag() };
                    features.push(edge_feature(edge, edge.line.clone(), source));
                    continue;
                }

                let (pieces, kept) = split_line(&edge.line, points, tol);
                report.split_edges += 1;
                report.split_pieces += pieces.len();
                for (part, piece) in pieces.into_iter().enumerate() {
                    features.push(
                        edge_feature(edge, piece, "merged")
                            .with_property("parent", edge.parent)
                            .with_property("part", part),
                    );
                }
                for split in kept {
                    if distance(split.junction, split.coord) > tol {
                        connectors.push(
                            Feature::new(LineString::new(vec![split.junction, split.coord]))
                                .with_property("source", "merged")
                                .with_property("origin", "connector"),
                        );
                    }
                }
            }
        }
    }

    report.connectors = connectors.len();
    features.extend(connectors);
    report.output_features = features.len();

    info!(
        "Merged networks: {} design + {} context -> {} features ({} junctions, {} split edges, {} connectors)",
        report.design_features,
        report.context_features,
        report.output_features,
        report.junctions,
        report.split_edges,
        report.connectors
    );

    Ok(MergedNetwork {
        network: FeatureSet::from_features(frame, features),
        report,
    })
}

/// Bring both networks into one frame.
///
/// A projected frame shared by both sides (or held by the only non-empty
/// side) is kept. Otherwise a local frame on either side wins, and
/// geographic or UTM input meets in a frame derived from the combined
/// centroid.
fn reconcile(design: &FeatureSet, context: &FeatureSet) -> Result<(FeatureSet, FeatureSet)> {
    let frame = match (design.crs, context.crs) {
        (a, b) if a == b && a.is_projected() => a,
        (a, _) if context.is_empty() && a.is_projected() => a,
        (_, b) if design.is_empty() && b.is_projected() => b,
        (Crs::Local(p), _) | (_, Crs::Local(p)) => Crs::Local(p),
        _ => {
            let combined = FeatureSet::from_features(
                Crs::Geographic,
                to_geographic(design)?
                    .features
                    .into_iter()
                    .chain(to_geographic(context)?.features)
                    .collect(),
            );
            match combined.centroid() {
                Some(center) => Crs::Local(derive_projection(center)?),
                // No coordinates anywhere, nothing to project
                None => Crs::Geographic,
            }
        }
    };
    debug!("Merging in frame {}", frame);

    let into_frame = |set: &FeatureSet| -> Result<FeatureSet> {
        match frame {
            Crs::Local(p) if set.crs != frame => ensure_projected(&to_geographic(set)?, Some(&p)),
            _ => Ok(FeatureSet::from_features(frame, set.features.clone())),
        }
    };
    Ok((into_frame(design)?, into_frame(context)?))
}

/// Split each feature into line edges or a pass-through item.
fn collect_lines(
    set: &FeatureSet,
    side: Side,
    edges: &mut Vec<LineEdge>,
    items: &mut Vec<Item>,
    report: &mut MergeReport,
) {
    for (parent, feature) in set.iter().enumerate() {
        let parts: Vec<(Option<usize>, &LineString<f64>)> = match &feature.geometry {
            Some(Geometry::LineString(ls)) if ls.0.len() >= 2 => vec![(None, ls)],
            Some(Geometry::MultiLineString(mls)) => mls
                .0
                .iter()
                .enumerate()
                .filter(|(_, ls)| ls.0.len() >= 2)
                .map(|(i, ls)| (Some(i), ls))
                .collect(),
            _ => Vec::new(),
        };

        if parts.is_empty() {
            report.passed_through += 1;
            items.push(Item::Pass(side, feature.clone()));
            continue;
        }

        report.exploded_parts += parts.len() - 1;
        for (multipart, line) in parts {
            items.push(Item::Edge(edges.len()));
            edges.push(LineEdge {
                side,
                parent,
                multipart,
                template: feature.clone(),
                line: line.clone(),
                joined: false,
            });
        }
    }
}

fn edge_feature(edge: &LineEdge, line: LineString<f64>, source: &str) -> Feature {
    let mut feature = edge.template.with_geometry(Geometry::LineString(line));
    feature.set_property("source", source);
    feature.set_property("origin", edge.side.tag());
    if let Some(part) = edge.multipart {
        feature.set_property("multipart", part);
    }
    feature
}

fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn envelope(line: &LineString<f64>) -> AABB<[f64; 2]> {
    let (mut min, mut max) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for c in line.coords() {
        min = [min[0].min(c.x), min[1].min(c.y)];
        max = [max[0].max(c.x), max[1].max(c.y)];
    }
    AABB::from_corners(min, max)
}

/// Closest point of `line` to `p`, first segment on ties
fn closest_point(line: &LineString<f64>, p: Coord<f64>) -> Option<SplitPoint> {
    let mut best: Option<(f64, SplitPoint)> = None;
    for (segment, window) in line.0.windows(2).enumerate() {
        let (a, b) = (window[0], window[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
        };
        let coord = Coord {
            x: a.x + t * dx,
            y: a.y + t * dy,
        };
        let d = distance(coord, p);
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((
                d,
                SplitPoint {
                    segment,
                    t,
                    coord,
                    junction: p,
                },
            ));
        }
    }
    best.map(|(_, split)| split)
}

/// Cut `line` at the split points.
///
/// Returns the pieces in order along the line, and the split points with
/// each one's coordinate moved onto the cut it was merged into.
fn split_line(
    line: &LineString<f64>,
    mut points: Vec<SplitPoint>,
    tol: f64,
) -> (Vec<LineString<f64>>, Vec<SplitPoint>) {
    let coords = &line.0;
    let last_segment = coords.len() - 2;

    // A cut at the end of a segment is the start of the next one
    for p in points.iter_mut() {
        if p.t >= 1.0 && p.segment < last_segment {
            p.segment += 1;
            p.t = 0.0;
        }
    }
    points.sort_by(|a, b| a.segment.cmp(&b.segment).then(a.t.total_cmp(&b.t)));

    let mut cuts: Vec<Coord<f64>> = Vec::new();
    let mut cut_segments: Vec<usize> = Vec::new();
    for p in points.iter_mut() {
        match cuts.last() {
            Some(&prev) if distance(prev, p.coord) <= tol => p.coord = prev,
            _ => {
                cuts.push(p.coord);
                cut_segments.push(p.segment);
            }
        }
    }

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut current = vec![coords[0]];
    let mut next_vertex = 1;
    for (&cut, &segment) in cuts.iter().zip(&cut_segments) {
        while next_vertex <= segment {
            current.push(coords[next_vertex]);
            next_vertex += 1;
        }
        if current.last() != Some(&cut) {
            current.push(cut);
        }
        pieces.push(LineString::new(std::mem::replace(&mut current, vec![cut])));
    }
    current.extend_from_slice(&coords[next_vertex..]);
    pieces.push(LineString::new(current));

    (pieces, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::line_length;
    use approx::assert_abs_diff_eq;
    use collage_core::LocalProjection;
    use geo::{MultiLineString, Point};

    fn frame() -> Crs {
        Crs::Local(LocalProjection::new(-0.1276, 51.5072).unwrap())
    }

    fn line(coords: &[(f64, f64)]) -> Feature {
        Feature::new(LineString::from(coords.to_vec()))
    }

    fn network(features: Vec<Feature>) -> FeatureSet {
        FeatureSet::from_features(frame(), features)
    }

    fn tag<'a>(f: &'a Feature, key: &str) -> Option<&'a str> {
        f.get_property(key).and_then(|v| v.as_str())
    }

    fn total_length(set: &FeatureSet, origin: &str) -> f64 {
        set.iter()
            .filter(|f| tag(f, "origin") == Some(origin))
            .filter_map(|f| match &f.geometry {
                Some(Geometry::LineString(ls)) => Some(line_length(ls)),
                _ => None,
            })
            .sum()
    }

    fn assert_accounting(r: &MergeReport) {
        assert_eq!(
            r.output_features,
            r.design_features + r.context_features + r.exploded_parts + r.split_pieces
                - r.split_edges
                + r.connectors
        );
    }

    #[test]
    fn test_disjoint_networks_concatenate() {
        let design = network(vec![line(&[(0.0, 0.0), (100.0, 0.0)])]);
        let context = network(vec![line(&[(1000.0, 0.0), (1100.0, 0.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();

        assert_eq!(merged.network.len(), 2);
        assert_eq!(merged.report.junctions, 0);
        assert_eq!(tag(&merged.network.features[0], "source"), Some("design"));
        assert_eq!(tag(&merged.network.features[1], "source"), Some("context"));
        assert_eq!(merged.network.crs, frame());
        assert_accounting(&merged.report);
    }

    #[test]
    fn test_context_endpoint_snaps_to_design() {
        let design = network(vec![line(&[(0.0, 0.0), (100.0, 0.0)])]);
        let context = network(vec![line(&[(103.0, 4.0), (200.0, 4.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();

        assert_eq!(merged.report.snapped_endpoints, 1);
        assert_eq!(merged.report.junctions, 1);
        let ctx = &merged.network.features[1];
        assert_eq!(tag(ctx, "source"), Some("merged"));
        assert_eq!(tag(ctx, "origin"), Some("context"));
        let Some(Geometry::LineString(ls)) = &ctx.geometry else {
            panic!("expected line");
        };
        assert_eq!(ls.0[0], Coord { x: 100.0, y: 0.0 });
        assert_eq!(ls.0[1], Coord { x: 200.0, y: 4.0 });
    }

    #[test]
    fn test_snaps_to_nearest_design_endpoint() {
        let design = network(vec![
            line(&[(0.0, 0.0), (100.0, 0.0)]),
            line(&[(120.0, 0.0), (300.0, 0.0)]),
        ]);
        let context = network(vec![line(&[(112.0, 30.0), (112.0, 300.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();

        let Some(Geometry::LineString(ls)) = &merged.network.features[2].geometry else {
            panic!("expected line");
        };
        // (120, 0) is 31.0 m away, (100, 0) is 32.3 m away
        assert_eq!(ls.0[0], Coord { x: 120.0, y: 0.0 });
    }

    #[test]
    fn test_passing_edge_is_split_with_connector() {
        // Context street ends at the design dead end (0, 0); a design
        // street runs 10 m north of it without ending there.
        let design = network(vec![
            line(&[(0.0, -100.0), (0.0, 0.0)]),
            line(&[(-200.0, 10.0), (200.0, 10.0)]),
        ]);
        let context = network(vec![line(&[(-150.0, -100.0), (0.0, 0.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        let r = &merged.report;

        assert_eq!(r.junctions, 1);
        assert_eq!(r.split_edges, 1);
        assert_eq!(r.split_pieces, 2);
        assert_eq!(r.connectors, 1);
        assert_eq!(r.output_features, 5);
        assert_accounting(r);

        let pieces: Vec<&Feature> = merged
            .network
            .iter()
            .filter(|f| f.get_property("part").is_some())
            .collect();
        assert_eq!(pieces.len(), 2);
        for piece in &pieces {
            assert_eq!(piece.get_property("parent").and_then(|v| v.as_f64()), Some(1.0));
            assert_eq!(tag(piece, "origin"), Some("design"));
        }

        let connector = merged.network.features.last().unwrap();
        assert_eq!(tag(connector, "origin"), Some("connector"));
        let Some(Geometry::LineString(ls)) = &connector.geometry else {
            panic!("expected line");
        };
        assert_eq!(ls.0, vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 10.0 }]);
    }

    #[test]
    fn test_split_preserves_length() {
        let design = network(vec![
            line(&[(0.0, -100.0), (0.0, 0.0)]),
            line(&[(-200.0, 10.0), (-50.0, 12.0), (60.0, 8.0), (200.0, 10.0)]),
        ]);
        let context = network(vec![line(&[(-150.0, -100.0), (0.0, 0.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();

        assert_eq!(merged.report.split_edges, 1);
        let expected: f64 = design
            .iter()
            .filter_map(|f| match &f.geometry {
                Some(Geometry::LineString(ls)) => Some(line_length(ls)),
                _ => None,
            })
            .sum();
        assert_abs_diff_eq!(total_length(&merged.network, "design"), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_multilinestring_exploded_and_points_pass_through() {
        let multi = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (50.0, 0.0)]),
            LineString::from(vec![(500.0, 0.0), (550.0, 0.0)]),
        ]);
        let design = network(vec![Feature::new(multi), Feature::new(Point::new(5.0, 5.0))]);
        let context = network(vec![Feature::empty()]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        let r = &merged.report;

        assert_eq!(r.exploded_parts, 1);
        assert_eq!(r.passed_through, 2);
        assert_eq!(r.output_features, 4);
        assert_accounting(r);
        assert_eq!(
            merged.network.features[1].get_property("multipart").and_then(|v| v.as_f64()),
            Some(1.0)
        );
        assert_eq!(tag(&merged.network.features[3], "source"), Some("context"));
    }

    #[test]
    fn test_geographic_inputs_share_derived_frame() {
        let mut design = FeatureSet::geographic();
        design.push(line(&[(2.1700, 41.3900), (2.1710, 41.3900)]));
        let mut context = FeatureSet::geographic();
        context.push(line(&[(2.1710, 41.3901), (2.1720, 41.3901)]));

        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        assert!(merged.network.crs.local().is_some());
        // 11 m apart: snapped
        assert_eq!(merged.report.snapped_endpoints, 1);
    }

    #[test]
    fn test_local_frame_is_kept() {
        let design = network(vec![line(&[(0.0, 0.0), (100.0, 0.0)])]);
        let mut context = FeatureSet::geographic();
        context.push(line(&[(-0.1262, 51.5072), (-0.1250, 51.5072)]));

        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        assert_eq!(merged.network.crs, frame());
        // ~97 m east of the frame center, 3 m from the design end
        assert_eq!(merged.report.snapped_endpoints, 1);
    }

    #[test]
    fn test_foreign_frames_mismatch() {
        let design = FeatureSet::from_features(Crs::Epsg(25830), vec![line(&[(0.0, 0.0), (1.0, 0.0)])]);
        let context = FeatureSet::from_features(Crs::Epsg(25831), vec![line(&[(0.0, 0.0), (1.0, 0.0)])]);
        assert!(matches!(
            merge_networks(&design, &context, &MergeParams::default()),
            Err(Error::CrsMismatch(_, _))
        ));

        let same = FeatureSet::from_features(Crs::Epsg(25830), vec![line(&[(5.0, 0.0), (9.0, 0.0)])]);
        let merged = merge_networks(&design, &same, &MergeParams::default()).unwrap();
        assert_eq!(merged.network.crs, Crs::Epsg(25830));
    }

    #[test]
    fn test_shared_endpoint_marks_context_edge_merged() {
        let design = network(vec![line(&[(0.0, 0.0), (100.0, 0.0)])]);
        let exact = network(vec![line(&[(100.0, 0.0), (200.0, 0.0)])]);
        let offset = network(vec![line(&[(100.002, 0.0), (200.0, 0.0)])]);

        let a = merge_networks(&design, &exact, &MergeParams::default()).unwrap();
        let b = merge_networks(&design, &offset, &MergeParams::default()).unwrap();

        assert_eq!(a.report.junctions, 1);
        assert_eq!(a.report.snapped_endpoints, 0);
        assert_eq!(b.report.snapped_endpoints, 1);
        assert_eq!(tag(&a.network.features[1], "source"), Some("merged"));
        assert_eq!(tag(&b.network.features[1], "source"), Some("merged"));
        assert_eq!(a.network.features[1].geometry, b.network.features[1].geometry);
    }

    #[test]
    fn test_short_edge_keeps_far_end() {
        let design = network(vec![line(&[(0.0, 0.0), (100.0, 0.0)])]);
        let context = network(vec![line(&[(102.0, 3.0), (101.0, 1.0)])]);
        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        let r = &merged.report;

        assert_eq!(r.kept_far_ends, 1);
        assert_eq!(r.snapped_endpoints, 1);
        assert_eq!(r.junctions, 1);
        assert_accounting(r);
        let Some(Geometry::LineString(ls)) = &merged.network.features[1].geometry else {
            panic!("expected line");
        };
        // The nearer end joins, the line keeps its length
        assert_eq!(ls.0, vec![Coord { x: 102.0, y: 3.0 }, Coord { x: 100.0, y: 0.0 }]);
        assert!(line_length(ls) > 3.0);
    }

    #[test]
    fn test_utm_and_geographic_inputs_merge() {
        let zone = collage_core::UtmZone::from_epsg(32631).unwrap();
        let utm_line = LineString::new(vec![
            zone.forward(Coord { x: 2.1700, y: 41.3900 }),
            zone.forward(Coord { x: 2.1710, y: 41.3900 }),
        ]);
        let design = FeatureSet::from_features(Crs::from_epsg(32631), vec![Feature::new(utm_line)]);
        let mut context = FeatureSet::geographic();
        context.push(line(&[(2.1710, 41.3901), (2.1720, 41.3901)]));

        let merged = merge_networks(&design, &context, &MergeParams::default()).unwrap();
        assert!(merged.network.crs.local().is_some());
        // 11 m apart: snapped
        assert_eq!(merged.report.snapped_endpoints, 1);
        assert_eq!(merged.report.junctions, 1);
    }

    #[test]
    fn test_both_empty() {
        let merged =
            merge_networks(&FeatureSet::geographic(), &FeatureSet::geographic(), &MergeParams::default())
                .unwrap();
        assert!(merged.network.is_empty());
        assert_eq!(merged.report, MergeReport::default());
    }

    #[test]
    fn test_split_line_multiple_cuts() {
        let ls = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let at = |segment, t, x| SplitPoint {
            segment,
            t,
            coord: Coord { x, y: 0.0 },
            junction: Coord { x, y: 5.0 },
        };
        // Second cut sits on the shared vertex, third is a duplicate
        let (pieces, kept) = split_line(
            &ls,
            vec![at(1, 0.5, 15.0), at(0, 1.0, 10.0), at(1, 0.5, 15.0)],
            0.001,
        );
        assert_eq!(pieces.len(), 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(pieces[0].0, vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 }]);
        assert_eq!(pieces[1].0, vec![Coord { x: 10.0, y: 0.0 }, Coord { x: 15.0, y: 0.0 }]);
        assert_eq!(pieces[2].0, vec![Coord { x: 15.0, y: 0.0 }, Coord { x: 20.0, y: 0.0 }]);
        let total: f64 = pieces.iter().map(line_length).sum();
        assert_abs_diff_eq!(total, 20.0);
    }
}
