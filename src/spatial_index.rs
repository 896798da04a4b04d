//! Quadtree wrapper with auto-rebuild and viewport conveniences.
//!
//! [`SpatialIndexManager`] tracks insert volume and periodically checks
//! the tree's packing efficiency; when sustained skewed inserts
//! fragment the index, it rebuilds automatically so query pruning stays
//! effective without the caller scheduling maintenance.

use crate::diagnostics::{self, Diagnostics};
use crate::error::{ClusterError, Result};
use crate::quadtree::{QuadTree, TreeStats};
use crate::types::{Bounds, EngineConfig, Point};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Insert/query throughput measured by [`SpatialIndexManager::benchmark`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkReport {
    pub points: usize,
    pub insert_duration: Duration,
    pub query_duration: Duration,
    pub inserts_per_sec: f64,
    pub queries_per_sec: f64,
}

/// Spatial index manager wrapping a [`QuadTree`] with degradation
/// heuristics and viewport-clipping queries.
pub struct SpatialIndexManager {
    tree: QuadTree,
    config: EngineConfig,
    len: usize,
    inserts_since_check: usize,
    rebuilds: u64,
    diagnostics: Arc<dyn Diagnostics>,
}

impl SpatialIndexManager {
    /// Create a manager over `bounds` with default configuration and
    /// the `log`-backed diagnostics sink.
    pub fn new(bounds: Bounds) -> Result<Self> {
        Self::with_config(bounds, EngineConfig::default(), diagnostics::default_sink())
    }

    pub fn with_config(
        bounds: Bounds,
        config: EngineConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self> {
        config.validate()?;
        let tree = QuadTree::new(bounds, config.tree_capacity, config.tree_max_depth)?;
        Ok(Self {
            tree,
            config,
            len: 0,
            inserts_since_check: 0,
            rebuilds: 0,
            diagnostics,
        })
    }

    /// Insert a point, returning `false` if it lies outside the index
    /// bounds. Every `rebuild_check_interval` successful inserts, the
    /// tree's packing efficiency is checked against
    /// `rebuild_threshold` and the index rebuilt if it fell below.
    pub fn insert(&mut self, point: Point) -> bool {
        if !self.tree.insert(point) {
            return false;
        }
        self.len += 1;
        self.inserts_since_check += 1;

        if self.inserts_since_check >= self.config.rebuild_check_interval {
            self.inserts_since_check = 0;
            let stats = self.tree.stats();
            if stats.efficiency < self.config.rebuild_threshold {
                self.diagnostics.info(&format!(
                    "index efficiency {:.3} below threshold {:.3}; rebuilding {} points",
                    stats.efficiency, self.config.rebuild_threshold, stats.total_points
                ));
                self.tree.rebuild();
                self.rebuilds += 1;
            }
        }
        true
    }

    /// Insert a batch, returning how many points were accepted;
    /// out-of-bounds points are skipped.
    pub fn insert_many(&mut self, points: impl IntoIterator<Item = Point>) -> usize {
        let mut inserted = 0;
        for point in points {
            if self.insert(point) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Like [`Self::insert_many`], but fails on the first point
    /// outside the index bounds instead of skipping it.
    pub fn try_insert_many(&mut self, points: impl IntoIterator<Item = Point>) -> Result<usize> {
        let mut inserted = 0;
        for point in points {
            let (x, y) = (point.x, point.y);
            if !self.insert(point) {
                return Err(ClusterError::OutOfBounds { x, y });
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Number of indexed points.
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// How many automatic rebuilds have been triggered.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn query(&self, range: &Bounds) -> Vec<Point> {
        self.tree.query(range)
    }

    pub fn query_circle(&self, cx: f64, cy: f64, radius: f64) -> Vec<Point> {
        self.tree.query_circle(cx, cy, radius)
    }

    pub fn query_nearest(&self, x: f64, y: f64, k: usize, max_radius: f64) -> Vec<Point> {
        self.tree.query_nearest(x, y, k, max_radius)
    }

    /// "What's visible now": all indexed points inside the viewport.
    /// Named alias of [`Self::query`].
    pub fn clip_to_viewport(&self, viewport: &Bounds) -> Vec<Point> {
        self.query(viewport)
    }

    /// Force a rebuild regardless of the heuristic.
    pub fn rebuild(&mut self) {
        self.tree.rebuild();
        self.rebuilds += 1;
    }

    /// Drop all points, keeping the bounds.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.len = 0;
        self.inserts_since_check = 0;
    }

    pub fn stats(&self) -> TreeStats {
        self.tree.stats()
    }

    pub fn bounds(&self) -> &Bounds {
        self.tree.bounds()
    }

    /// Measure insert and window-query throughput over `n` random
    /// points in a scratch tree with this manager's configuration.
    /// Intended for capacity planning, not as a precise benchmark —
    /// use the criterion suite for that.
    pub fn benchmark(&self, n: usize) -> Result<BenchmarkReport> {
        if n == 0 {
            return Err(ClusterError::invalid("n", "must be at least 1"));
        }

        let bounds = *self.tree.bounds();
        let mut scratch = QuadTree::new(
            bounds,
            self.config.tree_capacity,
            self.config.tree_max_depth,
        )?;
        let mut rng = rand::thread_rng();

        let points: Vec<Point> = (0..n)
            .map(|_| {
                Point::new(
                    bounds.x + rng.r#gen::<f64>() * bounds.width,
                    bounds.y + rng.r#gen::<f64>() * bounds.height,
                )
            })
            .collect();

        let insert_start = Instant::now();
        for point in points {
            scratch.insert(point);
        }
        let insert_duration = insert_start.elapsed();

        const QUERY_ROUNDS: usize = 100;
        let window_w = bounds.width / 10.0;
        let window_h = bounds.height / 10.0;
        let query_start = Instant::now();
        for _ in 0..QUERY_ROUNDS {
            let qx = bounds.x + rng.r#gen::<f64>() * (bounds.width - window_w).max(0.0);
            let qy = bounds.y + rng.r#gen::<f64>() * (bounds.height - window_h).max(0.0);
            let _ = scratch.query(&Bounds::new(qx, qy, window_w, window_h));
        }
        let query_duration = query_start.elapsed();

        Ok(BenchmarkReport {
            points: n,
            insert_duration,
            query_duration,
            inserts_per_sec: n as f64 / insert_duration.as_secs_f64().max(f64::EPSILON),
            queries_per_sec: QUERY_ROUNDS as f64 / query_duration.as_secs_f64().max(f64::EPSILON),
        })
    }
}
