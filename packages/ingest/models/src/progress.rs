//! Progress reporting for long-running ingestion work.
//!
//! Library code reports through [`ProgressCallback`]; binaries plug in a
//! terminal progress bar, tests and quiet runs use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from ingestion and upload runs.
pub trait ProgressCallback: Send + Sync {
    /// Sets how many rows or points the run will process.
    fn set_total(&self, total: u64);

    /// Records `delta` more processed units.
    fn inc(&self, delta: u64);

    /// Ends the run with a one-line summary.
    fn finish(&self, summary: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _summary: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
