//! Core value types and engine configuration.
//!
//! Coordinates are raw 2D values; projection happens upstream of this
//! crate. Payloads are opaque [`Bytes`] handles that the engine carries
//! through indexing and clustering without inspecting them.

use crate::error::{ClusterError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A 2D point with an opaque payload reference to caller data.
///
/// Immutable once inserted into a spatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Caller-owned data (id, attributes); never inspected by the engine.
    pub payload: Bytes,
}

impl Point {
    /// Create a point with an empty payload.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            payload: Bytes::new(),
        }
    }

    /// Create a point carrying caller data.
    pub fn with_payload(x: f64, y: f64, payload: impl Into<Bytes>) -> Self {
        Self {
            x,
            y,
            payload: payload.into(),
        }
    }

    /// Squared Euclidean distance to `(x, y)`.
    #[inline]
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

/// An axis-aligned rectangle used both as index-node extents and as a
/// query window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point falls inside this rectangle.
    ///
    /// The interval is half-open: `x ∈ [self.x, self.x + self.width)`,
    /// same for y. Adjacent rectangles therefore never both claim a
    /// point on their shared edge.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Whether two rectangles overlap.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.x + self.width < other.x
            || other.x + other.width < self.x
            || self.y + self.height < other.y
            || other.y + other.height < self.y)
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ClusterError::invalid("bounds", "coordinates must be finite"));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(ClusterError::invalid(
                "bounds",
                format!(
                    "width and height must be non-negative, got {}x{}",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }
}

/// The clustering algorithm's input unit: a point plus a weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub position: Point,
    /// Non-negative, finite; defaults to 1.
    pub weight: f64,
}

impl ClusterPoint {
    /// Create a cluster point with the default weight of 1.
    pub fn new(position: Point) -> Self {
        Self {
            position,
            weight: 1.0,
        }
    }

    /// Create a weighted cluster point.
    ///
    /// Fails fast on negative or non-finite weights rather than
    /// clamping.
    pub fn with_weight(position: Point, weight: f64) -> Result<Self> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ClusterError::invalid(
                "weight",
                format!("must be finite and non-negative, got {weight}"),
            ));
        }
        Ok(Self { position, weight })
    }
}

/// An aggregated group of nearby points.
///
/// Invariants: `count == points.len()`, `weight` is the sum of member
/// weights, and `position` is the weighted centroid when `count > 1`.
/// A singleton cluster's `position` equals its point's raw position
/// exactly, with no averaging drift.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub position: (f64, f64),
    pub points: Vec<ClusterPoint>,
    pub count: usize,
    pub weight: f64,
}

impl Cluster {
    /// Whether this cluster represents a single unmerged point.
    pub fn is_singleton(&self) -> bool {
        self.count == 1
    }
}

/// Parameters controlling a clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Cluster radius in projected units at zoom 0.
    #[serde(default = "ClusterParams::default_radius")]
    pub radius: f64,
    /// Minimum points a grid cell needs before it merges into one
    /// cluster; sparser cells emit singletons.
    #[serde(default = "ClusterParams::default_min_points")]
    pub min_points: usize,
    /// Zoom level beyond which clustering is bypassed entirely.
    #[serde(default = "ClusterParams::default_max_zoom")]
    pub max_zoom: f64,
}

impl ClusterParams {
    const fn default_radius() -> f64 {
        40.0
    }

    const fn default_min_points() -> usize {
        2
    }

    const fn default_max_zoom() -> f64 {
        16.0
    }

    /// Create validated parameters.
    pub fn new(radius: f64, min_points: usize, max_zoom: f64) -> Result<Self> {
        let params = Self {
            radius,
            min_points,
            max_zoom,
        };
        params.validate()?;
        Ok(params)
    }

    /// Fail fast on out-of-range values. Called by every entry point
    /// that accepts externally supplied parameters (e.g. deserialized
    /// configuration).
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ClusterError::invalid(
                "radius",
                format!("must be positive, got {}", self.radius),
            ));
        }
        if self.min_points == 0 {
            return Err(ClusterError::invalid("min_points", "must be at least 1"));
        }
        if !self.max_zoom.is_finite() || self.max_zoom < 0.0 {
            return Err(ClusterError::invalid(
                "max_zoom",
                format!("must be finite and non-negative, got {}", self.max_zoom),
            ));
        }
        Ok(())
    }
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
            min_points: Self::default_min_points(),
            max_zoom: Self::default_max_zoom(),
        }
    }
}

/// Engine configuration.
///
/// Designed to be easily serializable and loadable from JSON or other
/// formats while keeping complexity minimal.
///
/// # Example
///
/// ```rust
/// use mapcluster::EngineConfig;
///
/// let json = r#"{
///     "max_workers": 2,
///     "task_timeout_ms": 5000
/// }"#;
/// let config: EngineConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.parallel_threshold, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on background workers; further capped by hardware
    /// parallelism at pool construction.
    #[serde(default = "EngineConfig::default_max_workers")]
    pub max_workers: usize,

    /// Per-task deadline in milliseconds.
    #[serde(default = "EngineConfig::default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Point count above which clustering is offloaded to the pool.
    #[serde(default = "EngineConfig::default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Quadtree leaf capacity before subdivision.
    #[serde(default = "EngineConfig::default_tree_capacity")]
    pub tree_capacity: usize,

    /// Maximum quadtree depth; full leaves at this depth overflow
    /// instead of subdividing.
    #[serde(default = "EngineConfig::default_tree_max_depth")]
    pub tree_max_depth: usize,

    /// Packing-efficiency floor below which the index is rebuilt.
    #[serde(default = "EngineConfig::default_rebuild_threshold")]
    pub rebuild_threshold: f64,

    /// How many inserts between efficiency checks.
    #[serde(default = "EngineConfig::default_rebuild_check_interval")]
    pub rebuild_check_interval: usize,
}

impl EngineConfig {
    const fn default_max_workers() -> usize {
        4
    }

    const fn default_task_timeout_ms() -> u64 {
        30_000
    }

    const fn default_parallel_threshold() -> usize {
        1000
    }

    const fn default_tree_capacity() -> usize {
        8
    }

    const fn default_tree_max_depth() -> usize {
        12
    }

    const fn default_rebuild_threshold() -> f64 {
        0.3
    }

    const fn default_rebuild_check_interval() -> usize {
        1000
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(ClusterError::invalid("max_workers", "must be at least 1"));
        }
        if self.task_timeout_ms == 0 {
            return Err(ClusterError::invalid("task_timeout_ms", "must be positive"));
        }
        if self.tree_capacity == 0 {
            return Err(ClusterError::invalid("tree_capacity", "must be at least 1"));
        }
        if self.tree_max_depth == 0 {
            return Err(ClusterError::invalid("tree_max_depth", "must be at least 1"));
        }
        if !self.rebuild_threshold.is_finite() || !(0.0..=1.0).contains(&self.rebuild_threshold) {
            return Err(ClusterError::invalid(
                "rebuild_threshold",
                format!("must be within [0, 1], got {}", self.rebuild_threshold),
            ));
        }
        if self.rebuild_check_interval == 0 {
            return Err(ClusterError::invalid(
                "rebuild_check_interval",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: Self::default_max_workers(),
            task_timeout_ms: Self::default_task_timeout_ms(),
            parallel_threshold: Self::default_parallel_threshold(),
            tree_capacity: Self::default_tree_capacity(),
            tree_max_depth: Self::default_tree_max_depth(),
            rebuild_threshold: Self::default_rebuild_threshold(),
            rebuild_check_interval: Self::default_rebuild_check_interval(),
        }
    }
}
