//! Zoom-adaptive grid clustering.
//!
//! Pure functions: given a point set and validated [`ClusterParams`],
//! bucket points into square grid cells whose edge length shrinks as
//! zoom increases, then merge dense cells into weighted-centroid
//! clusters. No state, no I/O; linear in point count and independent
//! of spatial distribution skew.

use crate::types::{Cluster, ClusterParams, ClusterPoint};
use rustc_hash::FxHashMap;

/// Cap on the zoom exponent so the cell divisor stays representable
/// at extreme zoom levels.
const MAX_ZOOM_EXPONENT: f64 = 20.0;

/// Composite grid-cell key.
///
/// Integer fields rather than a spliced string, so `(-1, 2)` can never
/// collide with `(-12, ...)` across a sign boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    /// Bucket a coordinate pair for a given cell size.
    #[inline]
    pub fn for_position(x: f64, y: f64, cell_size: f64) -> Self {
        Self {
            x: (x / cell_size).floor() as i64,
            y: (y / cell_size).floor() as i64,
        }
    }
}

/// Edge length of a grid cell at `zoom`: `radius / 2^min(zoom, 20)`.
///
/// Strictly decreasing in zoom, which is the central zoom-adaptive
/// behavior — clusters shrink and split as the viewer zooms in.
#[inline]
pub fn cell_size(radius: f64, zoom: f64) -> f64 {
    radius / zoom.min(MAX_ZOOM_EXPONENT).exp2()
}

/// Group `points` into clusters for the given zoom level.
///
/// Above `params.max_zoom` clustering is bypassed and every point
/// becomes a singleton cluster in input order. Otherwise points are
/// bucketed by grid cell; a cell with at least `params.min_points`
/// members merges into one weighted-centroid cluster, while sparser
/// cells emit one singleton per point so low-density areas are never
/// under-counted.
///
/// Cluster ids are assigned densely over cells sorted by key, so
/// identical inputs always produce identical output, ids included.
pub fn cluster(points: &[ClusterPoint], params: &ClusterParams, zoom: f64) -> Vec<Cluster> {
    if points.is_empty() {
        return Vec::new();
    }

    if zoom > params.max_zoom {
        return points
            .iter()
            .enumerate()
            .map(|(i, p)| singleton(i, p.clone()))
            .collect();
    }

    let size = cell_size(params.radius, zoom);
    let mut cells: FxHashMap<CellKey, Vec<ClusterPoint>> = FxHashMap::default();
    for point in points {
        let key = CellKey::for_position(point.position.x, point.position.y, size);
        cells.entry(key).or_default().push(point.clone());
    }

    let mut keys: Vec<CellKey> = cells.keys().copied().collect();
    keys.sort_unstable();

    let mut clusters = Vec::with_capacity(keys.len());
    let mut next_id = 0usize;
    for key in keys {
        let Some(members) = cells.remove(&key) else {
            continue;
        };
        // A one-member cell is always a singleton, even with
        // min_points of 1: dividing by its own weight could move the
        // position by an ulp, and singleton positions must be exact.
        if members.len() >= params.min_points && members.len() > 1 {
            clusters.push(aggregate(next_id, members));
            next_id += 1;
        } else {
            for member in members {
                clusters.push(singleton(next_id, member));
                next_id += 1;
            }
        }
    }
    clusters
}

/// A cluster of one: position is the point's raw position, no
/// averaging drift.
fn singleton(id: usize, point: ClusterPoint) -> Cluster {
    Cluster {
        id: format!("cluster_{id}"),
        position: (point.position.x, point.position.y),
        weight: point.weight,
        count: 1,
        points: vec![point],
    }
}

/// Merge a dense cell into one cluster positioned at the
/// weight-weighted centroid `Σ(pos·weight) / Σweight`.
fn aggregate(id: usize, members: Vec<ClusterPoint>) -> Cluster {
    let total_weight: f64 = members.iter().map(|m| m.weight).sum();

    let position = if total_weight > 0.0 {
        let sx: f64 = members.iter().map(|m| m.position.x * m.weight).sum();
        let sy: f64 = members.iter().map(|m| m.position.y * m.weight).sum();
        (sx / total_weight, sy / total_weight)
    } else {
        // All-zero weights: fall back to the unweighted mean rather
        // than dividing by zero.
        let n = members.len() as f64;
        let sx: f64 = members.iter().map(|m| m.position.x).sum();
        let sy: f64 = members.iter().map(|m| m.position.y).sum();
        (sx / n, sy / n)
    };

    Cluster {
        id: format!("cluster_{id}"),
        position,
        count: members.len(),
        weight: total_weight,
        points: members,
    }
}
