//! Progress-callback trait for batch-run events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::convert::BatchConverter::with_progress`] to receive events as the
//! orchestrator moves through a run. All methods default to no-ops so
//! implementations override only what they need.
//!
//! # Example
//!
//! ```rust
//! use mediaconv::{BatchConverter, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, index: usize, total: usize, produced: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("unit {}/{} → {} outputs", index + 1, total, produced);
//!     }
//! }
//!
//! let converter = BatchConverter::new()
//!     .with_progress(Arc::new(CountingCallback { done: AtomicUsize::new(0) }));
//! ```

use crate::convert::RunState;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Units are processed sequentially, so calls for one run never overlap, but
/// the callback may be invoked from a blocking-pool thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first unit is loaded.
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called on every state transition, including into `Failed`.
    fn on_stage(&self, state: RunState) {
        let _ = state;
    }

    /// Called before a unit is loaded.
    ///
    /// # Arguments
    /// * `index`: 0-based position in the batch
    /// * `total`: batch size
    /// * `name` : the unit's file name
    fn on_unit_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after a unit has been loaded and, for per-unit modes, converted.
    ///
    /// `produced` is the number of results the unit yielded, or 0 when the
    /// unit only feeds a whole-batch conversion that runs later.
    fn on_unit_complete(&self, index: usize, total: usize, produced: usize) {
        let _ = (index, total, produced);
    }

    /// Called once when the run succeeds, with the number of exposed artifacts.
    fn on_run_complete(&self, artifacts: usize) {
        let _ = artifacts;
    }

    /// Called once when the run fails.
    fn on_run_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored in the converter.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
