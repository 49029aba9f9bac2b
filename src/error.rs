//! Error types for eventalign collapsing.
//!
//! Every stage of the pipeline reports failures through [`CollapseError`]. The
//! variants are grouped by when they can occur: while validating the
//! configuration, while resolving the input header, while parsing rows, and
//! while reading or writing files.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for collapse operations.
pub type Result<T> = std::result::Result<T, CollapseError>;

/// Errors that can occur while collapsing an eventalign file.
#[derive(Debug, Error)]
pub enum CollapseError {
    /// Total worker count leaves no room for a reader, an aggregator and a writer.
    #[error("invalid worker count {threads}: at least {min} are required (1 reader, 1+ aggregators, 1 writer)")]
    InvalidWorkerCount { threads: usize, min: usize },

    /// A requested statistic field is not recognised.
    #[error("invalid statistic field '{field}': valid values are mean, std, median, mad, count")]
    InvalidStatField { field: String },

    /// Queue capacity must allow at least one item in flight.
    #[error("invalid queue capacity {capacity}: must be at least 1")]
    InvalidQueueCapacity { capacity: usize },

    /// The input file cannot be opened for reading.
    #[error("cannot read input file '{path}': {source}")]
    InputUnreadable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The output location cannot be written.
    #[error("cannot write output file '{path}': {source}")]
    OutputUnwritable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The input stream ended before a header line was read.
    #[error("input has no header line")]
    MissingHeader,

    /// A required column is absent from the header.
    #[error("required column '{column}' not found in input header")]
    MissingColumn { column: &'static str },

    /// Only one of a pair of columns that must appear together is present.
    #[error("column '{present}' found in input header without its pair '{missing}'")]
    UnpairedColumn {
        present: &'static str,
        missing: &'static str,
    },

    /// A data row has a different number of fields than the header.
    #[error("line {line}: expected {expected} tab-separated fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A field could not be converted to the type its column requires.
    #[error("line {line}: invalid value '{value}' in column '{column}'")]
    InvalidField {
        line: u64,
        column: &'static str,
        value: String,
    },

    /// Failed while reading the input stream.
    #[error("failed to read input '{path}': {source}")]
    InputRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed while writing the collapsed output.
    #[error("failed to write output '{path}': {source}")]
    OutputWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to read an index file.
    #[error("failed to read index file '{path}': {source}")]
    IndexRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write an index file.
    #[error("failed to write index file '{path}': {source}")]
    IndexWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Invalid or corrupted index file.
    #[error("invalid index file '{path}': {details}")]
    InvalidIndex { details: String, path: PathBuf },

    /// A run reached an aggregator without any rows.
    #[error("read '{read_id}' on '{ref_id}' has no rows")]
    EmptyRun { read_id: String, ref_id: String },

    /// A pipeline thread could not be started.
    #[error("failed to spawn pipeline thread: {source}")]
    ThreadSpawn {
        #[source]
        source: std::io::Error,
    },

    /// A pipeline stage panicked before it could report a result.
    #[error("{stage} stage panicked")]
    StagePanicked { stage: &'static str },

    /// Failed to serialize the run summary.
    #[error("failed to serialize JSON: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },
}

impl CollapseError {
    /// Returns `true` for errors detected before any row was processed.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidWorkerCount { .. }
                | Self::InvalidStatField { .. }
                | Self::InvalidQueueCapacity { .. }
                | Self::InputUnreadable { .. }
                | Self::OutputUnwritable { .. }
        )
    }

    /// Returns `true` for header resolution errors.
    pub const fn is_schema(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader | Self::MissingColumn { .. } | Self::UnpairedColumn { .. }
        )
    }

    /// Returns `true` for malformed-row errors.
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::FieldCount { .. } | Self::InvalidField { .. })
    }
}

impl From<serde_json::Error> for CollapseError {
    fn from(source: serde_json::Error) -> Self {
        Self::JsonError { source }
    }
}
