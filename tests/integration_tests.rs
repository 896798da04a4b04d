use mapcluster::{
    Bounds, ClusterParams, ClusterPoint, CoordinatorBuilder, EngineConfig, Point, QuadTree,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn random_points(n: usize, seed: u64, extent: f64) -> Vec<ClusterPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let point = Point::with_payload(
                rng.r#gen::<f64>() * extent,
                rng.r#gen::<f64>() * extent,
                format!("p{i}"),
            );
            ClusterPoint::with_weight(point, rng.gen_range(0.0..10.0)).unwrap()
        })
        .collect()
}

#[test]
fn test_basic_clustering_flow() {
    let coordinator = CoordinatorBuilder::new().sequential().build().unwrap();
    let params = ClusterParams::new(100.0, 2, 15.0).unwrap();

    let points = vec![
        ClusterPoint::new(Point::new(0.0, 0.0)),
        ClusterPoint::new(Point::new(0.01, 0.0)),
        ClusterPoint::new(Point::new(10.0, 10.0)),
    ];
    let clusters = coordinator
        .cluster_sync("cities", &points, &params, 5.0)
        .unwrap();

    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters.iter().map(|c| c.count).sum::<usize>(), 3);
}

/// Conservation: the multiset union of cluster members equals the
/// input point set exactly — nothing duplicated, nothing dropped.
#[test]
fn test_conservation_over_random_input() {
    let points = random_points(1_000, 7, 1000.0);
    let params = ClusterParams::new(60.0, 3, 16.0).unwrap();

    for zoom in [0.0, 4.0, 9.0, 15.9] {
        let clusters = mapcluster::cluster(&points, &params, zoom);

        let mut input: Vec<_> = points
            .iter()
            .map(|p| (p.position.x.to_bits(), p.position.y.to_bits(), p.position.payload.clone()))
            .collect();
        let mut output: Vec<_> = clusters
            .iter()
            .flat_map(|c| c.points.iter())
            .map(|p| (p.position.x.to_bits(), p.position.y.to_bits(), p.position.payload.clone()))
            .collect();
        input.sort();
        output.sort();
        assert_eq!(input, output, "conservation violated at zoom {zoom}");
    }
}

/// Centroid correctness: recompute each multi-point cluster's centroid
/// independently from its members and compare within 1e-9.
#[test]
fn test_centroid_correctness() {
    let points = random_points(500, 11, 200.0);
    let params = ClusterParams::new(80.0, 2, 16.0).unwrap();
    let clusters = mapcluster::cluster(&points, &params, 3.0);

    let mut saw_merged = false;
    for cluster in &clusters {
        assert_eq!(cluster.count, cluster.points.len());
        let weight: f64 = cluster.points.iter().map(|p| p.weight).sum();
        assert!((cluster.weight - weight).abs() < 1e-9);

        if cluster.count > 1 {
            saw_merged = true;
            if weight > 0.0 {
                let cx: f64 = cluster
                    .points
                    .iter()
                    .map(|p| p.position.x * p.weight)
                    .sum::<f64>()
                    / weight;
                let cy: f64 = cluster
                    .points
                    .iter()
                    .map(|p| p.position.y * p.weight)
                    .sum::<f64>()
                    / weight;
                assert!((cluster.position.0 - cx).abs() < 1e-9);
                assert!((cluster.position.1 - cy).abs() < 1e-9);
            }
        } else {
            // Singleton identity: exactly the point's raw position.
            assert_eq!(cluster.position.0, cluster.points[0].position.x);
            assert_eq!(cluster.position.1, cluster.points[0].position.y);
        }
    }
    assert!(saw_merged, "test data should produce at least one merge");
}

/// Zoom bypass: above max_zoom every input point comes back as a
/// singleton cluster.
#[test]
fn test_zoom_bypass_monotonicity() {
    let points = random_points(300, 13, 100.0);
    let params = ClusterParams::new(60.0, 2, 12.0).unwrap();

    let clusters = mapcluster::cluster(&points, &params, 12.5);
    assert_eq!(clusters.len(), points.len());
    assert!(clusters.iter().all(|c| c.count == 1));
}

/// Quadtree containment: query(R) returns exactly the subset of
/// inserted points inside R, verified against a brute-force scan.
#[test]
fn test_quadtree_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(17);
    let bounds = Bounds::new(0.0, 0.0, 1000.0, 1000.0);
    let mut tree = QuadTree::new(bounds, 8, 10).unwrap();

    let points: Vec<Point> = (0..2_000)
        .map(|i| {
            Point::with_payload(
                rng.r#gen::<f64>() * 1000.0,
                rng.r#gen::<f64>() * 1000.0,
                format!("p{i}"),
            )
        })
        .collect();
    for point in &points {
        assert!(tree.insert(point.clone()));
    }

    for _ in 0..50 {
        let qx = rng.r#gen::<f64>() * 900.0;
        let qy = rng.r#gen::<f64>() * 900.0;
        let qw = rng.r#gen::<f64>() * 100.0;
        let qh = rng.r#gen::<f64>() * 100.0;
        let range = Bounds::new(qx, qy, qw, qh);

        let mut from_tree: Vec<_> = tree
            .query(&range)
            .into_iter()
            .map(|p| p.payload)
            .collect();
        let mut from_scan: Vec<_> = points
            .iter()
            .filter(|p| range.contains(p.x, p.y))
            .map(|p| p.payload.clone())
            .collect();
        from_tree.sort();
        from_scan.sort();
        assert_eq!(from_tree, from_scan);
    }
}

/// Cache determinism: two identical cluster_sync calls yield
/// bit-identical results — same ids, same order — so caching cannot
/// introduce nondeterminism between cached and uncached paths.
#[test]
fn test_cache_determinism() {
    let coordinator = CoordinatorBuilder::new().sequential().build().unwrap();
    let params = ClusterParams::new(50.0, 2, 16.0).unwrap();
    let points = random_points(800, 19, 500.0);

    let first = coordinator
        .cluster_sync("dataset", &points, &params, 6.0)
        .unwrap();
    let second = coordinator
        .cluster_sync("dataset", &points, &params, 6.0)
        .unwrap();
    assert_eq!(first, second);

    // And an uncached coordinator agrees with the cached result.
    let fresh = CoordinatorBuilder::new().sequential().build().unwrap();
    let uncached = fresh
        .cluster_sync("dataset", &points, &params, 6.0)
        .unwrap();
    assert_eq!(first, uncached);
}

/// Scenario: 5 points, radius 100, min_points 2, zoom 5, max_zoom 15.
/// cell_size = 100 / 2^5 = 3.125 puts the three origin-area points in
/// cell (0,0) and the (10, 10) pair in cell (3,3).
#[test]
fn test_grid_bucket_scenario() {
    let coordinator = CoordinatorBuilder::new().sequential().build().unwrap();
    let params = ClusterParams::new(100.0, 2, 15.0).unwrap();
    let points: Vec<ClusterPoint> = [
        (0.0, 0.0),
        (0.01, 0.0),
        (0.01, 0.01),
        (10.0, 10.0),
        (10.01, 10.0),
    ]
    .iter()
    .map(|&(x, y)| ClusterPoint::new(Point::new(x, y)))
    .collect();

    let clusters = coordinator
        .cluster_sync("scenario", &points, &params, 5.0)
        .unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].count, 3);
    assert_eq!(clusters[1].count, 2);
    assert!((clusters[1].position.0 - 10.005).abs() < 1e-9);
}

/// Scenario: empty point set returns an empty result, no error.
#[test]
fn test_empty_point_set() {
    let coordinator = CoordinatorBuilder::new().sequential().build().unwrap();
    let params = ClusterParams::default();
    let clusters = coordinator.cluster_sync("empty", &[], &params, 5.0).unwrap();
    assert!(clusters.is_empty());
}

/// Scenario: 2000 random points with parallel dispatch produce exactly
/// the result of the synchronous path with identical parameters.
#[test]
fn test_parallel_matches_sync() {
    let config = EngineConfig {
        parallel_threshold: 1000,
        ..EngineConfig::default()
    };
    let coordinator = CoordinatorBuilder::new().config(config).build().unwrap();
    let params = ClusterParams::new(40.0, 2, 16.0).unwrap();
    let points = random_points(2_000, 23, 2000.0);

    let parallel = coordinator
        .cluster_async("parallel_run", points.clone(), &params, 7.0, true)
        .unwrap()
        .wait();
    let sync = coordinator
        .cluster_sync("sync_run", &points, &params, 7.0)
        .unwrap();

    assert_eq!(parallel, sync);
}

#[test]
fn test_engine_config_json_round_trip() {
    let config = EngineConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config.max_workers, back.max_workers);
    assert_eq!(config.task_timeout_ms, back.task_timeout_ms);
    assert_eq!(config.rebuild_check_interval, back.rebuild_check_interval);
}
