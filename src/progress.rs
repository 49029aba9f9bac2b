//! Progress tracking for collapse runs.
//!
//! The writer updates a [`ProgressTracker`] after every block it writes. The
//! tracker can be shared with other threads to poll progress, and an optional
//! callback is invoked on each update.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventalign_collapse::builder::Collapser;
//!
//! let summary = Collapser::new()
//!     .input("eventalign.tsv")
//!     .output("collapsed.tsv")
//!     .run_with_progress(|progress| {
//!         if progress.reads_written % 10_000 == 0 {
//!             eprintln!("{} reads ({} kmers)", progress.reads_written, progress.kmers_written);
//!         }
//!     })?;
//! # Ok::<(), eventalign_collapse::error::CollapseError>(())
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with a progress snapshot.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Progress snapshot during a collapse run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Number of read blocks written so far.
    pub reads_written: u64,
    /// Number of kmer rows written so far.
    pub kmers_written: u64,
}

/// Thread-safe progress tracker using atomic counters.
#[derive(Default)]
pub struct ProgressTracker {
    reads: AtomicU64,
    kmers: AtomicU64,
    callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("progress", &self.snapshot())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressTracker {
    /// Create a new progress tracker with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            kmers: AtomicU64::new(0),
            callback: None,
        }
    }

    /// Create a tracker that calls `callback` after every recorded read.
    #[must_use]
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
            ..Self::new()
        }
    }

    /// Record that a read block with `kmers` rows has been written.
    pub fn record_read(&self, kmers: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.kmers.fetch_add(kmers, Ordering::Relaxed);
        if let Some(callback) = &self.callback {
            callback(self.snapshot());
        }
    }

    /// Get a snapshot of the current progress.
    ///
    /// The returned values represent the state at a point in time and may
    /// change immediately after this call returns.
    pub fn snapshot(&self) -> Progress {
        Progress {
            reads_written: self.reads.load(Ordering::Relaxed),
            kmers_written: self.kmers.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tracker_starts_at_zero() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.snapshot(), Progress::default());
    }

    #[test]
    fn tracker_records_reads() {
        let tracker = ProgressTracker::new();
        tracker.record_read(100);
        tracker.record_read(50);

        let progress = tracker.snapshot();
        assert_eq!(progress.reads_written, 2);
        assert_eq!(progress.kmers_written, 150);
    }

    #[test]
    fn callback_sees_each_update() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tracker = {
            let seen = Arc::clone(&seen);
            ProgressTracker::with_callback(move |p| seen.lock().unwrap().push(p.reads_written))
        };
        tracker.record_read(3);
        tracker.record_read(4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
