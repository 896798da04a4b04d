//! Memo table for clustering results.
//!
//! One entry per dataset key; a lookup hits only when the stored zoom
//! exactly equals the requested zoom. There is no interpolation across
//! zoom buckets — callers that quantize zoom before asking get a
//! higher hit rate. Entries must be invalidated whenever the dataset's
//! source points or cluster parameters change; the cache cannot detect
//! that itself.

use crate::types::Cluster;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct CacheEntry {
    zoom: f64,
    clusters: Vec<Cluster>,
}

/// Hit/miss counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Cluster-result cache keyed by `(dataset key, zoom)`.
#[derive(Debug, Default)]
pub struct ClusterCache {
    entries: FxHashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result for the dataset at exactly `zoom`.
    pub fn get(&mut self, dataset_key: &str, zoom: f64) -> Option<Vec<Cluster>> {
        match self.entries.get(dataset_key) {
            Some(entry) if entry.zoom == zoom => {
                self.hits += 1;
                Some(entry.clusters.clone())
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, overwriting any prior entry for the key.
    pub fn put(&mut self, dataset_key: &str, zoom: f64, clusters: Vec<Cluster>) {
        self.entries
            .insert(dataset_key.to_string(), CacheEntry { zoom, clusters });
    }

    /// Drop the entry for a dataset. Required whenever the caller
    /// mutates the dataset's points or its cluster parameters.
    pub fn invalidate(&mut self, dataset_key: &str) -> bool {
        self.entries.remove(dataset_key).is_some()
    }

    /// Drop all entries, keeping counters.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
