//! Progress-callback trait for batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to be told when
//! a batch starts, after every completed group, and when the batch ends.
//!
//! Progress is reported per group rather than per deck: a group is the unit
//! the scheduler waits on, so "groups completed / total groups" is the only
//! count that is both real and monotonic.
//!
//! # Example
//!
//! ```rust
//! use deckqr::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_group_complete(&self, _group: usize, _groups: usize, processed: usize, _total: usize) {
//!         self.0.store(processed, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchReport, ConversionOutcome};
use std::sync::Arc;

/// Called by the scheduler as a batch advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls are made from the scheduler's own task, never
/// concurrently.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first group starts.
    ///
    /// # Arguments
    /// * `total_files`  — decks in the batch
    /// * `total_groups` — number of groups they were split into
    fn on_batch_start(&self, total_files: usize, total_groups: usize) {
        let _ = (total_files, total_groups);
    }

    /// Called after every deck of a group reached a terminal state.
    ///
    /// # Arguments
    /// * `group`        — 1-indexed group number
    /// * `total_groups` — number of groups
    /// * `processed`    — cumulative decks finished so far
    /// * `total_files`  — decks in the batch
    fn on_group_complete(
        &self,
        group: usize,
        total_groups: usize,
        processed: usize,
        total_files: usize,
    ) {
        let _ = (group, total_groups, processed, total_files);
    }

    /// Called once per deck, in input order, right after its group finishes.
    ///
    /// # Arguments
    /// * `index`   — 0-indexed position in the input list
    /// * `outcome` — the deck's terminal record
    fn on_outcome(&self, index: usize, outcome: &ConversionOutcome) {
        let _ = (index, outcome);
    }

    /// Called once with the final report.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        groups: AtomicUsize,
        last_processed: AtomicUsize,
        outcomes: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_group_complete(&self, _group: usize, _total: usize, processed: usize, _files: usize) {
            self.groups.fetch_add(1, Ordering::SeqCst);
            self.last_processed.store(processed, Ordering::SeqCst);
        }

        fn on_outcome(&self, _index: usize, _outcome: &ConversionOutcome) {
            self.outcomes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3, 2);
        cb.on_group_complete(1, 2, 2, 3);
        cb.on_outcome(0, &ConversionOutcome::failure("a.pptx", "boom"));
        cb.on_batch_complete(&BatchReport::empty());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_group_complete(1, 2, 2, 3);
        tracker.on_outcome(0, &ConversionOutcome::failure("a.pptx", "x"));
        tracker.on_group_complete(2, 2, 3, 3);
        assert_eq!(tracker.groups.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.last_processed.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.outcomes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10, 4);
    }
}
