//! 2D k-d tree over graph nodes
//!
//! Provides O(log n) nearest-node queries for snapping arbitrary
//! coordinates onto a network. Equidistant candidates are resolved by
//! [`NodeKey`] order so the answer does not depend on insertion order.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use super::node::{Node, NodeKey};

/// A 2D k-d tree for nearest-node queries.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    /// Indexed points, in the caller's order
    points: Vec<Node>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    /// Left child index (None = leaf)
    left: Option<usize>,
    /// Right child index (None = leaf)
    right: Option<usize>,
}

/// Result of a nearest-neighbor query
#[derive(Debug, Clone, Copy)]
pub struct NearestResult {
    pub node: Node,
    pub distance_sq: f64,
    /// Index of the node in the slice the tree was built from
    pub index: usize,
}

impl NearestResult {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

impl KdTree {
    /// Build a k-d tree from nodes.
    ///
    /// Construction is O(n log n) using median-of-coordinate splitting.
    pub fn build(points: &[Node]) -> Self {
        if points.is_empty() {
            return Self {
                nodes: Vec::new(),
                points: Vec::new(),
            };
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        build_recursive(points, &mut indices, 0, &mut nodes);

        Self {
            nodes,
            points: points.to_vec(),
        }
    }

    /// Number of points in the tree.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Find the node nearest to (qx, qy), smallest key on ties.
    ///
    /// Returns `None` if the tree is empty.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<NearestResult> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Best {
            distance_sq: f64::INFINITY,
            key: NodeKey(i64::MAX, i64::MAX),
            index: 0,
        };
        self.nearest_recursive(0, qx, qy, &mut best);

        Some(NearestResult {
            node: self.points[best.index],
            distance_sq: best.distance_sq,
            index: best.index,
        })
    }

    fn nearest_recursive(&self, node_idx: usize, qx: f64, qy: f64, best: &mut Best) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point_idx];

        let dx = qx - p.coord.x;
        let dy = qy - p.coord.y;
        let dist_sq = dx * dx + dy * dy;

        if dist_sq < best.distance_sq || (dist_sq == best.distance_sq && p.key < best.key) {
            best.distance_sq = dist_sq;
            best.key = p.key;
            best.index = node.point_idx;
        }

        // Determine which side to search first
        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, qx, qy, best);
        }

        // `<=` so that equidistant nodes across the plane are still compared
        if diff * diff <= best.distance_sq {
            if let Some(child) = second {
                self.nearest_recursive(child, qx, qy, best);
            }
        }
    }
}

struct Best {
    distance_sq: f64,
    key: NodeKey,
    index: usize,
}

/// Recursively build the k-d tree.
fn build_recursive(
    points: &[Node],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    let axis = |i: usize| {
        if split_dim == 0 {
            points[i].coord.x
        } else {
            points[i].coord.y
        }
    };
    indices.sort_by(|&a, &b| axis(a).total_cmp(&axis(b)));

    let median = n / 2;
    let point_idx = indices[median];

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx,
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let left_idx = build_recursive(points, &mut indices[..median], depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }

    if median + 1 < n {
        let right_idx = build_recursive(points, &mut indices[median + 1..], depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}
