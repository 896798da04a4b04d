//! Orchestration of clustering requests.
//!
//! The coordinator decides, per request, whether a clustering pass runs
//! synchronously on the calling thread or is offloaded to the worker
//! pool, owns the result cache, and recovers from background failures.
//! Its contract is "always return a usable cluster set": infrastructure
//! errors (timeout, worker failure) are absorbed by recomputing
//! synchronously and only ever reach the diagnostics sink.

use crate::cache::{CacheStats, ClusterCache};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::grid;
use crate::scheduler::{Job, SchedulerStats, TaskHandle, TaskProgress, TaskScheduler};
use crate::types::{Cluster, ClusterParams, ClusterPoint, EngineConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Typed job dispatched to the worker pool: one clustering pass.
pub(crate) struct ClusterJob {
    points: Arc<[ClusterPoint]>,
    params: ClusterParams,
    zoom: f64,
}

impl Job for ClusterJob {
    type Output = Vec<Cluster>;

    fn run(self, progress: &TaskProgress) -> Vec<Cluster> {
        progress.report(0.0);
        let clusters = grid::cluster(&self.points, &self.params, self.zoom);
        progress.report(1.0);
        clusters
    }
}

/// Decides sync vs. parallel execution per request, owns the cache,
/// and falls back to the calling thread when the pool lets it down.
pub struct ClusterCoordinator {
    cache: Arc<Mutex<ClusterCache>>,
    scheduler: Option<TaskScheduler<ClusterJob>>,
    parallel_threshold: usize,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ClusterCoordinator {
    /// Create a coordinator.
    ///
    /// With `allow_parallel`, a worker pool is constructed up front; if
    /// that fails (e.g. a sandboxed environment that cannot spawn
    /// threads), the failure is logged once and parallel clustering
    /// stays disabled for this coordinator's lifetime — requests simply
    /// take the synchronous path instead of retrying per call.
    pub fn new(
        config: &EngineConfig,
        diagnostics: Arc<dyn Diagnostics>,
        allow_parallel: bool,
    ) -> Result<Self> {
        config.validate()?;

        let scheduler = if allow_parallel {
            match TaskScheduler::new(
                config.max_workers,
                Duration::from_millis(config.task_timeout_ms),
                Arc::clone(&diagnostics),
            ) {
                Ok(scheduler) => Some(scheduler),
                Err(e) => {
                    diagnostics.warn(&format!("background clustering disabled: {e}"));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            cache: Arc::new(Mutex::new(ClusterCache::new())),
            scheduler,
            parallel_threshold: config.parallel_threshold,
            diagnostics,
        })
    }

    /// Cluster `points` for `zoom`, possibly in the background.
    ///
    /// Returns a pending-result handle. A cache hit or a request that
    /// takes the synchronous path resolves immediately; a dispatched
    /// request resolves on [`PendingClusters::wait`], which absorbs
    /// timeout and worker failure by recomputing on the calling thread.
    /// The result is cached under `(dataset_key, zoom)` either way.
    pub fn cluster_async(
        &self,
        dataset_key: &str,
        points: Vec<ClusterPoint>,
        params: &ClusterParams,
        zoom: f64,
        allow_parallel: bool,
    ) -> Result<PendingClusters> {
        params.validate()?;

        if let Some(cached) = self.cache.lock().get(dataset_key, zoom) {
            self.diagnostics
                .debug(&format!("cache hit for `{dataset_key}` at zoom {zoom}"));
            return Ok(PendingClusters::ready(cached));
        }
        self.diagnostics
            .debug(&format!("cache miss for `{dataset_key}` at zoom {zoom}"));

        if allow_parallel && points.len() > self.parallel_threshold {
            if let Some(scheduler) = &self.scheduler {
                if scheduler.has_capacity() {
                    let points: Arc<[ClusterPoint]> = points.into();
                    let handle = scheduler.execute(ClusterJob {
                        points: Arc::clone(&points),
                        params: *params,
                        zoom,
                    });
                    return Ok(PendingClusters {
                        inner: PendingInner::Dispatched {
                            handle,
                            dataset_key: dataset_key.to_string(),
                            points,
                            params: *params,
                            zoom,
                            cache: Arc::clone(&self.cache),
                            diagnostics: Arc::clone(&self.diagnostics),
                        },
                    });
                }
                self.diagnostics.debug(&format!(
                    "worker pool saturated; clustering `{dataset_key}` synchronously"
                ));
            }
        }

        let clusters = grid::cluster(&points, params, zoom);
        self.cache.lock().put(dataset_key, zoom, clusters.clone());
        Ok(PendingClusters::ready(clusters))
    }

    /// Cluster on the calling thread unconditionally.
    ///
    /// Same caching behavior as [`Self::cluster_async`]; used by
    /// callers that cannot tolerate background execution.
    pub fn cluster_sync(
        &self,
        dataset_key: &str,
        points: &[ClusterPoint],
        params: &ClusterParams,
        zoom: f64,
    ) -> Result<Vec<Cluster>> {
        params.validate()?;

        if let Some(cached) = self.cache.lock().get(dataset_key, zoom) {
            self.diagnostics
                .debug(&format!("cache hit for `{dataset_key}` at zoom {zoom}"));
            return Ok(cached);
        }

        let clusters = grid::cluster(points, params, zoom);
        self.cache.lock().put(dataset_key, zoom, clusters.clone());
        Ok(clusters)
    }

    /// Drop the cached result for a dataset. Callers must do this
    /// whenever they mutate the dataset's points or its parameters.
    pub fn invalidate(&self, dataset_key: &str) -> bool {
        self.cache.lock().invalidate(dataset_key)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Whether background clustering is available at all.
    pub fn parallel_enabled(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(TaskScheduler::stats)
    }
}

/// Pending result of a clustering request.
pub struct PendingClusters {
    inner: PendingInner,
}

enum PendingInner {
    Ready(Vec<Cluster>),
    Dispatched {
        handle: TaskHandle<Vec<Cluster>>,
        dataset_key: String,
        points: Arc<[ClusterPoint]>,
        params: ClusterParams,
        zoom: f64,
        cache: Arc<Mutex<ClusterCache>>,
        diagnostics: Arc<dyn Diagnostics>,
    },
}

impl PendingClusters {
    fn ready(clusters: Vec<Cluster>) -> Self {
        Self {
            inner: PendingInner::Ready(clusters),
        }
    }

    /// Whether the result resolved without background work.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, PendingInner::Ready(_))
    }

    /// Resolve the request. Never fails: a timed-out or failed
    /// background task is recomputed synchronously on this thread,
    /// so the caller always gets a cluster set.
    pub fn wait(self) -> Vec<Cluster> {
        match self.inner {
            PendingInner::Ready(clusters) => clusters,
            PendingInner::Dispatched {
                handle,
                dataset_key,
                points,
                params,
                zoom,
                cache,
                diagnostics,
            } => {
                let clusters = match handle.wait() {
                    Ok(clusters) => clusters,
                    Err(e) => {
                        diagnostics.warn(&format!(
                            "parallel clustering for `{dataset_key}` failed ({e}); \
                             recomputing synchronously"
                        ));
                        grid::cluster(&points, &params, zoom)
                    }
                };
                cache.lock().put(&dataset_key, zoom, clusters.clone());
                clusters
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullDiagnostics;
    use crate::types::Point;

    fn coordinator(config: EngineConfig, allow_parallel: bool) -> ClusterCoordinator {
        ClusterCoordinator::new(&config, Arc::new(NullDiagnostics), allow_parallel).unwrap()
    }

    fn grid_points(n: usize) -> Vec<ClusterPoint> {
        (0..n)
            .map(|i| {
                ClusterPoint::new(Point::new((i % 100) as f64 * 0.01, (i / 100) as f64 * 0.01))
            })
            .collect()
    }

    #[test]
    fn sync_path_caches_results() {
        let coordinator = coordinator(EngineConfig::default(), false);
        let params = ClusterParams::default();
        let points = grid_points(20);

        let first = coordinator
            .cluster_sync("cities", &points, &params, 5.0)
            .unwrap();
        let second = coordinator
            .cluster_sync("cities", &points, &params, 5.0)
            .unwrap();
        assert_eq!(first, second);

        let stats = coordinator.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn small_requests_stay_synchronous() {
        let coordinator = coordinator(EngineConfig::default(), true);
        let params = ClusterParams::default();

        let pending = coordinator
            .cluster_async("cities", grid_points(10), &params, 5.0, true)
            .unwrap();
        assert!(pending.is_ready());
        assert!(!pending.wait().is_empty());
    }

    #[test]
    fn large_requests_dispatch_and_match_sync() {
        let config = EngineConfig {
            parallel_threshold: 50,
            ..EngineConfig::default()
        };
        let coordinator = coordinator(config, true);
        let params = ClusterParams::default();
        let points = grid_points(500);

        let pending = coordinator
            .cluster_async("async", points.clone(), &params, 5.0, true)
            .unwrap();
        assert!(!pending.is_ready() || !coordinator.parallel_enabled());
        let parallel = pending.wait();

        let sync = coordinator
            .cluster_sync("sync", &points, &params, 5.0)
            .unwrap();
        assert_eq!(parallel, sync);
    }

    #[test]
    fn dispatched_result_lands_in_cache() {
        let config = EngineConfig {
            parallel_threshold: 50,
            ..EngineConfig::default()
        };
        let coordinator = coordinator(config, true);
        let params = ClusterParams::default();
        let points = grid_points(200);

        let resolved = coordinator
            .cluster_async("cities", points.clone(), &params, 3.0, true)
            .unwrap()
            .wait();

        let cached = coordinator
            .cluster_async("cities", points, &params, 3.0, true)
            .unwrap();
        assert!(cached.is_ready());
        assert_eq!(cached.wait(), resolved);
    }

    #[test]
    fn timed_out_dispatch_recovers_synchronously() {
        let config = EngineConfig {
            max_workers: 1,
            task_timeout_ms: 1,
            parallel_threshold: 10,
            ..EngineConfig::default()
        };
        let coordinator = coordinator(config, true);
        let params = ClusterParams::default();
        // Large enough that the background pass cannot beat the 1 ms
        // deadline; wait() must recover on the calling thread.
        let points = grid_points(300_000);

        let pending = coordinator
            .cluster_async("slow", points.clone(), &params, 6.0, true)
            .unwrap();
        if coordinator.parallel_enabled() {
            assert!(!pending.is_ready());
        }
        let recovered = pending.wait();

        assert_eq!(recovered, grid::cluster(&points, &params, 6.0));
        // The fallback result is cached like any other.
        let cached = coordinator
            .cluster_async("slow", points, &params, 6.0, true)
            .unwrap();
        assert!(cached.is_ready());
        assert_eq!(cached.wait(), recovered);
    }

    #[test]
    fn per_call_flag_disables_dispatch() {
        let config = EngineConfig {
            parallel_threshold: 10,
            ..EngineConfig::default()
        };
        let coordinator = coordinator(config, true);
        let params = ClusterParams::default();

        let pending = coordinator
            .cluster_async("cities", grid_points(100), &params, 5.0, false)
            .unwrap();
        assert!(pending.is_ready());
    }

    #[test]
    fn sequential_coordinator_never_enables_parallel() {
        let coordinator = coordinator(EngineConfig::default(), false);
        assert!(!coordinator.parallel_enabled());
        assert!(coordinator.scheduler_stats().is_none());
    }

    #[test]
    fn invalidate_forces_recompute() {
        let coordinator = coordinator(EngineConfig::default(), false);
        let params = ClusterParams::default();
        let points = grid_points(20);

        coordinator
            .cluster_sync("cities", &points, &params, 5.0)
            .unwrap();
        assert!(coordinator.invalidate("cities"));

        coordinator
            .cluster_sync("cities", &points, &params, 5.0)
            .unwrap();
        let stats = coordinator.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn invalid_params_fail_fast() {
        let coordinator = coordinator(EngineConfig::default(), false);
        let bad = ClusterParams {
            radius: -1.0,
            min_points: 2,
            max_zoom: 16.0,
        };
        assert!(
            coordinator
                .cluster_sync("cities", &grid_points(5), &bad, 5.0)
                .is_err()
        );
    }
}
