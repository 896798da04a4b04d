//! Region quadtree over 2D points.
//!
//! Each node covers an axis-aligned rectangle and holds points directly
//! until it reaches capacity, at which point it subdivides into four
//! equal quadrants and redistributes. Subdivision stops at `max_depth`:
//! a full leaf at maximum depth accumulates points past capacity
//! instead of splitting further. That overflow is a deliberate policy
//! to bound tree depth (and recursion) on pathological inputs such as
//! thousands of coincident points, not a bug.

use crate::error::{ClusterError, Result};
use crate::types::{Bounds, Point};
use smallvec::SmallVec;

/// Inline leaf storage; leaves spill to the heap past this.
const NODE_INLINE_POINTS: usize = 8;

/// Child order within a subdivided node.
const NW: usize = 0;
const NE: usize = 1;
const SW: usize = 2;
const SE: usize = 3;

#[derive(Debug, Clone)]
struct Node {
    bounds: Bounds,
    depth: usize,
    points: SmallVec<[Point; NODE_INLINE_POINTS]>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn leaf(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            points: SmallVec::new(),
            children: None,
        }
    }

    /// Split into four equal quadrants. Quadrant membership uses the
    /// same half-open comparison as [`Node::child_index`], so a point
    /// on a split line always lands in exactly one child.
    fn subdivide(&mut self) {
        let (cx, cy) = self.bounds.center();
        let hw = self.bounds.width / 2.0;
        let hh = self.bounds.height / 2.0;
        let depth = self.depth + 1;

        self.children = Some(Box::new([
            Node::leaf(Bounds::new(self.bounds.x, cy, hw, hh), depth),
            Node::leaf(Bounds::new(cx, cy, hw, hh), depth),
            Node::leaf(Bounds::new(self.bounds.x, self.bounds.y, hw, hh), depth),
            Node::leaf(Bounds::new(cx, self.bounds.y, hw, hh), depth),
        ]));
    }

    #[inline]
    fn child_index(&self, x: f64, y: f64) -> usize {
        let (cx, cy) = self.bounds.center();
        match (y >= cy, x >= cx) {
            (true, false) => NW,
            (true, true) => NE,
            (false, false) => SW,
            (false, true) => SE,
        }
    }
}

/// Aggregate statistics over a [`QuadTree`], used by the rebuild
/// heuristic and for capacity planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeStats {
    pub total_points: usize,
    pub total_nodes: usize,
    pub max_depth_reached: usize,
    /// `total_points / (total_nodes * capacity)`, clamped to `[0, 1]`.
    /// Near 1 means nodes are well packed; near 0 means fragmentation.
    pub efficiency: f64,
}

/// A region-based recursive spatial index over 2D points.
#[derive(Debug, Clone)]
pub struct QuadTree {
    root: Node,
    capacity: usize,
    max_depth: usize,
}

impl QuadTree {
    /// Create an empty tree covering `bounds`.
    ///
    /// Fails fast on zero `capacity` or `max_depth`, or on non-finite
    /// or negative-extent bounds.
    pub fn new(bounds: Bounds, capacity: usize, max_depth: usize) -> Result<Self> {
        bounds.validate()?;
        if capacity == 0 {
            return Err(ClusterError::invalid("capacity", "must be at least 1"));
        }
        if max_depth == 0 {
            return Err(ClusterError::invalid("max_depth", "must be at least 1"));
        }
        Ok(Self {
            root: Node::leaf(bounds, 0),
            capacity,
            max_depth,
        })
    }

    /// The rectangle this tree indexes.
    pub fn bounds(&self) -> &Bounds {
        &self.root.bounds
    }

    /// Insert a point, returning `false` if it lies outside the root
    /// bounds. The caller decides whether to grow the index or drop
    /// the point.
    pub fn insert(&mut self, point: Point) -> bool {
        if !self.root.bounds.contains(point.x, point.y) {
            return false;
        }
        Self::insert_into(&mut self.root, point, self.capacity, self.max_depth);
        true
    }

    fn insert_into(node: &mut Node, point: Point, capacity: usize, max_depth: usize) {
        if node.children.is_none() && node.points.len() >= capacity && node.depth < max_depth {
            node.subdivide();
            let existing = std::mem::take(&mut node.points);
            for p in existing {
                Self::insert_into(node, p, capacity, max_depth);
            }
        }

        let idx = node.child_index(point.x, point.y);
        match node.children.as_mut() {
            Some(children) => {
                Self::insert_into(&mut children[idx], point, capacity, max_depth);
            }
            // Leaf with room, or a full leaf at max depth (overflow).
            None => node.points.push(point),
        }
    }

    /// Return all points inside `range` (half-open on both axes),
    /// recursing only into children whose bounds intersect it.
    pub fn query(&self, range: &Bounds) -> Vec<Point> {
        let mut out = Vec::new();
        Self::query_node(&self.root, range, &mut out);
        out
    }

    fn query_node(node: &Node, range: &Bounds, out: &mut Vec<Point>) {
        if !node.bounds.intersects(range) {
            return;
        }
        for p in &node.points {
            if range.contains(p.x, p.y) {
                out.push(p.clone());
            }
        }
        if let Some(children) = &node.children {
            for child in children.iter() {
                Self::query_node(child, range, out);
            }
        }
    }

    /// Return all points within Euclidean distance `radius` of
    /// `(cx, cy)`: a square query over the circle's bounding box,
    /// filtered by squared distance.
    pub fn query_circle(&self, cx: f64, cy: f64, radius: f64) -> Vec<Point> {
        let bbox = Bounds::new(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
        let mut points = self.query(&bbox);
        let r_sq = radius * radius;
        points.retain(|p| p.distance_sq(cx, cy) <= r_sq);
        points
    }

    /// Find up to `k` points nearest to `(x, y)` by expanding-ring
    /// search: the radius doubles from a small seed until at least `k`
    /// candidates are found or `max_radius` is exceeded, then
    /// candidates are sorted by distance.
    ///
    /// Approximate but correct within the final ring; not a guaranteed
    /// globally-optimal k-NN. Accepted trade-off for interactive use.
    pub fn query_nearest(&self, x: f64, y: f64, k: usize, max_radius: f64) -> Vec<Point> {
        if k == 0 || max_radius <= 0.0 {
            return Vec::new();
        }

        let seed = (self.root.bounds.width.max(self.root.bounds.height) / 1024.0).max(1e-9);
        let mut radius = seed.min(max_radius);
        let mut candidates;
        loop {
            candidates = self.query_circle(x, y, radius);
            if candidates.len() >= k || radius >= max_radius {
                break;
            }
            radius = (radius * 2.0).min(max_radius);
        }

        candidates.sort_by(|a, b| {
            a.distance_sq(x, y)
                .partial_cmp(&b.distance_sq(x, y))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);
        candidates
    }

    /// Collect every stored point by full traversal.
    pub fn collect_points(&self) -> Vec<Point> {
        let mut out = Vec::new();
        Self::collect_node(&self.root, &mut out);
        out
    }

    fn collect_node(node: &Node, out: &mut Vec<Point>) {
        out.extend(node.points.iter().cloned());
        if let Some(children) = &node.children {
            for child in children.iter() {
                Self::collect_node(child, out);
            }
        }
    }

    /// Drop every node and point, keeping the root bounds.
    pub fn clear(&mut self) {
        self.root = Node::leaf(self.root.bounds, 0);
    }

    /// Collect all points, clear, and reinsert.
    ///
    /// Restores packing after many inserts skew cell density; the
    /// rebuilt tree subdivides along the actual distribution instead
    /// of the historical insertion order.
    pub fn rebuild(&mut self) {
        let points = self.collect_points();
        self.clear();
        for point in points {
            // Collected points were inside the root bounds already.
            self.insert(point);
        }
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.stats().total_points
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the tree and report packing statistics.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            total_points: 0,
            total_nodes: 0,
            max_depth_reached: 0,
            efficiency: 0.0,
        };
        Self::stats_node(&self.root, &mut stats);

        let theoretical = (stats.total_nodes * self.capacity) as f64;
        if theoretical > 0.0 {
            stats.efficiency = (stats.total_points as f64 / theoretical).clamp(0.0, 1.0);
        }
        stats
    }

    fn stats_node(node: &Node, stats: &mut TreeStats) {
        stats.total_nodes += 1;
        stats.total_points += node.points.len();
        stats.max_depth_reached = stats.max_depth_reached.max(node.depth);
        if let Some(children) = &node.children {
            for child in children.iter() {
                Self::stats_node(child, stats);
            }
        }
    }
}
