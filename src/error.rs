//! Error types for the clustering engine.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors produced by the indexing and clustering engine.
///
/// Infrastructural failures (`WorkerUnavailable`, `TaskTimeout`,
/// `TaskFailed`) are absorbed by the coordinator's synchronous fallback
/// and surface to callers only through the diagnostics sink; parameter
/// errors are raised at construction time and never deferred.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A construction parameter was zero, negative, or non-finite.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A point lies outside the root bounds of a spatial index.
    ///
    /// `QuadTree::insert` reports this condition via its boolean return;
    /// this variant exists for batched callers that want a hard error.
    #[error("point ({x}, {y}) lies outside the index bounds")]
    OutOfBounds { x: f64, y: f64 },

    /// Background execution could not be initialized.
    ///
    /// Reported once, at scheduler construction. The coordinator treats
    /// parallel clustering as permanently unavailable for the process
    /// lifetime rather than retrying per call.
    #[error("worker pool unavailable: {0}")]
    WorkerUnavailable(String),

    /// A dispatched task exceeded its deadline.
    #[error("task did not complete within {timeout_ms} ms")]
    TaskTimeout { timeout_ms: u64 },

    /// A worker panicked or the pool shut down while a task was in flight.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl ClusterError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
