//! Graph node identity
//!
//! Coordinates are never compared as raw floats. Each one is quantized onto
//! a grid whose cells have a diagonal equal to the tolerance, so two
//! coordinates sharing a cell are always within tolerance of each other.
//! A coordinate resolves to the closest existing node within tolerance,
//! looking at the surrounding cells, and creates a new node otherwise.

use std::collections::HashMap;
use std::f64::consts::SQRT_2;

use collage_core::{Error, Result};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// Cells searched on each side of a coordinate's own cell.
///
/// A neighbor within the tolerance can be at most `ceil(sqrt(2))` cells
/// away along each axis.
const SEARCH_RADIUS: i64 = 2;

/// Quantized projected coordinate; total order by x then y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub i64, pub i64);

impl NodeKey {
    /// Grid cell of `c` for a given tolerance
    pub fn quantize(c: Coord<f64>, tolerance: f64) -> Self {
        let cell = tolerance / SQRT_2;
        NodeKey((c.x / cell).round() as i64, (c.y / cell).round() as i64)
    }
}

/// A graph node: its key and the first coordinate that created it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub key: NodeKey,
    pub coord: Coord<f64>,
}

/// Assigns node indices to coordinates under a fixed tolerance
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    tolerance: f64,
    nodes: Vec<Node>,
    cells: HashMap<NodeKey, usize>,
}

impl NodeRegistry {
    /// # Errors
    /// [`Error::InvalidParameter`] unless `tolerance` is finite and positive.
    pub fn new(tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(Error::InvalidParameter {
                name: "node_tolerance_m",
                value: tolerance.to_string(),
                reason: "must be a positive number".into(),
            });
        }
        Ok(Self {
            tolerance,
            nodes: Vec::new(),
            cells: HashMap::new(),
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Index of the existing node closest to `c` within tolerance
    pub fn find(&self, c: Coord<f64>) -> Option<usize> {
        let NodeKey(kx, ky) = NodeKey::quantize(c, self.tolerance);
        let tol_sq = self.tolerance * self.tolerance;
        let mut best: Option<(f64, NodeKey, usize)> = None;

        for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
            for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
                let Some(&idx) = self.cells.get(&NodeKey(kx + dx, ky + dy)) else {
                    continue;
                };
                let node = &self.nodes[idx];
                let d_sq = (node.coord.x - c.x).powi(2) + (node.coord.y - c.y).powi(2);
                if d_sq > tol_sq {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some((best_sq, best_key, _)) => {
                        d_sq < best_sq || (d_sq == best_sq && node.key < best_key)
                    }
                };
                if closer {
                    best = Some((d_sq, node.key, idx));
                }
            }
        }
        best.map(|(_, _, idx)| idx)
    }

    /// Node index for `c`, creating a node when none is within tolerance
    pub fn resolve(&mut self, c: Coord<f64>) -> usize {
        if let Some(idx) = self.find(c) {
            return idx;
        }
        // Any node already in this cell would have been within tolerance
        let key = NodeKey::quantize(c, self.tolerance);
        let idx = self.nodes.len();
        self.nodes.push(Node { key, coord: c });
        self.cells.insert(key, idx);
        idx
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}
