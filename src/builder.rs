//! Builder pattern API for ergonomic collapsing.
//!
//! This module provides a fluent builder interface for configuring and
//! executing a collapse run.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventalign_collapse::builder::Collapser;
//! use eventalign_collapse::stats::StatField;
//!
//! let summary = Collapser::new()
//!     .input("eventalign.tsv")
//!     .output("collapsed.tsv")
//!     .threads(8)
//!     .stat_fields([StatField::Mean, StatField::Std])
//!     .run()?;
//!
//! println!("{} reads, {} kmers", summary.reads, summary.kmers);
//! # Ok::<(), eventalign_collapse::error::CollapseError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::{CollapseConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS},
    error::Result,
    input::Input,
    pipeline::collapse_with_progress,
    progress::{Progress, ProgressTracker},
    stats::StatField,
    writer::RunSummary,
};

/// A builder for configuring collapse runs.
///
/// Settings are validated when [`config()`](Collapser::config) or
/// [`run()`](Collapser::run) is called.
#[derive(Debug, Clone)]
pub struct Collapser {
    input: Input,
    output: Option<PathBuf>,
    threads: usize,
    max_reads: u64,
    write_samples: bool,
    stat_fields: Vec<StatField>,
    queue_capacity: usize,
}

impl Default for Collapser {
    fn default() -> Self {
        Self::new()
    }
}

impl Collapser {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - input: stdin
    /// - `threads`: 4 (1 reader, 2 aggregators, 1 writer)
    /// - `max_reads`: 0 (no limit)
    /// - `stat_fields`: mean, median, count
    /// - `queue_capacity`: 1000
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: Input::Stdin,
            output: None,
            threads: DEFAULT_WORKERS,
            max_reads: 0,
            write_samples: false,
            stat_fields: StatField::DEFAULT.to_vec(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the input file; `-` reads stdin.
    #[must_use]
    pub fn input<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.input = Input::from_path(path.as_ref());
        self
    }

    /// Sets the output file. The index is written to `<output>.idx`.
    #[must_use]
    pub fn output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Sets the total worker count, reader and writer included.
    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Stops after `max_reads` reads; 0 disables the limit.
    #[must_use]
    pub const fn max_reads(mut self, max_reads: u64) -> Self {
        self.max_reads = max_reads;
        self
    }

    /// Echo raw samples as the last column when the input has them.
    #[must_use]
    pub const fn write_samples(mut self, write_samples: bool) -> Self {
        self.write_samples = write_samples;
        self
    }

    /// Sets the per-kmer statistics, in output order.
    #[must_use]
    pub fn stat_fields<I: IntoIterator<Item = StatField>>(mut self, fields: I) -> Self {
        self.stat_fields = fields.into_iter().collect();
        self
    }

    /// Sets the capacity of the work and output queues.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Validates the settings into a [`CollapseConfig`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid worker count or queue
    /// capacity, an unreadable input, or a missing or unwritable output.
    pub fn config(&self) -> Result<CollapseConfig> {
        let output = self.output.clone().unwrap_or_default();
        let mut config = CollapseConfig::new(self.input.clone(), output, self.threads, self.max_reads)?
            .with_queue_capacity(self.queue_capacity)?;
        config.write_samples = self.write_samples;
        config.stat_fields.clone_from(&self.stat_fields);
        Ok(config)
    }

    /// Runs the collapse.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, or the first error raised by the pipeline.
    pub fn run(&self) -> Result<RunSummary> {
        collapse_with_progress(&self.config()?, Arc::new(ProgressTracker::new()))
    }

    /// Runs the collapse, invoking `callback` after every read block is written.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, or the first error raised by the pipeline.
    pub fn run_with_progress<F>(&self, callback: F) -> Result<RunSummary>
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        collapse_with_progress(&self.config()?, Arc::new(ProgressTracker::with_callback(callback)))
    }
}
