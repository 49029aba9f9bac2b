//! Validated configuration for a collapse run.

use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use crate::{
    error::{CollapseError, Result},
    input::Input,
    stats::StatField,
};

/// Workers reserved for the reader and the writer.
pub const RESERVED_WORKERS: usize = 2;

/// Smallest usable worker count: one reader, one aggregator, one writer.
pub const MIN_WORKERS: usize = RESERVED_WORKERS + 1;

/// Default total worker count.
pub const DEFAULT_WORKERS: usize = 4;

/// Default capacity of the work and output queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Suffix appended to the output path to name the side-car index.
pub const INDEX_SUFFIX: &str = ".idx";

/// Everything the pipeline needs to run, validated up front.
#[derive(Debug, Clone)]
pub struct CollapseConfig {
    pub input: Input,
    pub output: PathBuf,
    /// Number of parallel aggregators (total workers minus reader and writer).
    pub aggregators: usize,
    /// Stop after this many reads; `None` for no limit.
    pub max_reads: Option<u64>,
    /// Echo raw samples as a final column when samples are present.
    pub write_samples: bool,
    /// Statistics computed per kmer when samples are present, in output order.
    pub stat_fields: Vec<StatField>,
    pub queue_capacity: usize,
}

impl CollapseConfig {
    /// Validates the raw settings.
    ///
    /// `threads` is the total worker count including the reader and the
    /// writer; `max_reads == 0` disables the read limit.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if fewer than [`MIN_WORKERS`] are given,
    /// if the input file cannot be read, or if the output or index file cannot
    /// be created.
    pub fn new(input: Input, output: impl Into<PathBuf>, threads: usize, max_reads: u64) -> Result<Self> {
        if threads < MIN_WORKERS {
            return Err(CollapseError::InvalidWorkerCount {
                threads,
                min: MIN_WORKERS,
            });
        }
        input.check_readable()?;

        let output = output.into();
        check_writable(&output)?;
        check_writable(&index_path(&output))?;

        Ok(Self {
            input,
            output,
            aggregators: threads - RESERVED_WORKERS,
            max_reads: (max_reads > 0).then_some(max_reads),
            write_samples: false,
            stat_fields: StatField::DEFAULT.to_vec(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        })
    }

    /// Sets the statistic fields from their names.
    ///
    /// # Errors
    ///
    /// Returns [`CollapseError::InvalidStatField`] for an unknown name.
    pub fn with_stat_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.stat_fields = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// Sets the queue capacity.
    ///
    /// # Errors
    ///
    /// Returns [`CollapseError::InvalidQueueCapacity`] for zero.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CollapseError::InvalidQueueCapacity { capacity });
        }
        self.queue_capacity = capacity;
        Ok(self)
    }

    /// Path of the side-car index written next to the output.
    pub fn index_path(&self) -> PathBuf {
        index_path(&self.output)
    }

    /// Total worker count, reader and writer included.
    pub const fn threads(&self) -> usize {
        self.aggregators + RESERVED_WORKERS
    }
}

/// Returns `<output>.idx`.
pub fn index_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

fn check_writable(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(drop)
        .map_err(|source| CollapseError::OutputUnwritable {
            source,
            path: path.to_path_buf(),
        })
}
