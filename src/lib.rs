//! Spatial indexing and zoom-adaptive clustering engine for interactive
//! exploration of large point datasets on a map.
//!
//! ```rust
//! use mapcluster::{ClusterParams, ClusterPoint, CoordinatorBuilder, Point};
//!
//! let coordinator = CoordinatorBuilder::new().build()?;
//! let params = ClusterParams::new(100.0, 2, 15.0)?;
//!
//! let points = vec![
//!     ClusterPoint::new(Point::new(0.0, 0.0)),
//!     ClusterPoint::new(Point::new(0.01, 0.0)),
//!     ClusterPoint::new(Point::new(10.0, 10.0)),
//! ];
//! let clusters = coordinator.cluster_sync("cities", &points, &params, 5.0)?;
//! assert_eq!(clusters.iter().map(|c| c.count).sum::<usize>(), 3);
//! # Ok::<(), mapcluster::ClusterError>(())
//! ```

pub mod builder;
pub mod cache;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod quadtree;
pub mod scheduler;
pub mod spatial_index;
pub mod types;

pub use builder::CoordinatorBuilder;
pub use error::{ClusterError, Result};

pub use cache::{CacheStats, ClusterCache};
pub use coordinator::{ClusterCoordinator, PendingClusters};
pub use diagnostics::{Diagnostics, LogDiagnostics, NullDiagnostics};
pub use grid::{CellKey, cell_size, cluster};
pub use quadtree::{QuadTree, TreeStats};
pub use scheduler::{Job, SchedulerStats, TaskHandle, TaskId, TaskProgress, TaskScheduler};
pub use spatial_index::{BenchmarkReport, SpatialIndexManager};
pub use types::{Bounds, Cluster, ClusterParams, ClusterPoint, EngineConfig, Point};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{ClusterError, CoordinatorBuilder, Result};

    pub use crate::{Bounds, Cluster, ClusterParams, ClusterPoint, EngineConfig, Point};

    pub use crate::{ClusterCoordinator, PendingClusters, SpatialIndexManager};

    pub use crate::{Diagnostics, LogDiagnostics, NullDiagnostics};

    pub use std::time::Duration;
}
