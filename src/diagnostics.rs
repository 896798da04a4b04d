//! Injectable diagnostics sink.
//!
//! Components take an `Arc<dyn Diagnostics>` at construction instead of
//! reaching for a process-wide logger, so embedders can route engine
//! events (cache hits, rebuilds, worker fallbacks) wherever they like.
//! Absence of a sink changes observability only, never behavior.

use std::sync::Arc;

/// Severity-leveled diagnostics interface consumed by the engine.
pub trait Diagnostics: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards diagnostics to the `log` facade under the crate's target.
///
/// This is the default sink; pair it with `env_logger` (or any other
/// `log` backend) in the host application.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn debug(&self, message: &str) {
        log::debug!(target: "mapcluster", "{message}");
    }

    fn info(&self, message: &str) {
        log::info!(target: "mapcluster", "{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!(target: "mapcluster", "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: "mapcluster", "{message}");
    }
}

/// Discards all diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Default sink used when the caller does not inject one.
pub(crate) fn default_sink() -> Arc<dyn Diagnostics> {
    Arc::new(LogDiagnostics)
}
