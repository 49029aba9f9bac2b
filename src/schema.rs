//! Header resolution for eventalign tables.
//!
//! The header line is parsed once per run into an immutable [`Schema`] that
//! records the position of every column the pipeline reads. Stages share it
//! behind an `Arc` and never look columns up by name again.

use crate::error::{CollapseError, Result};

/// Reference sequence id column.
pub const CONTIG: &str = "contig";
/// Preferred read id column.
pub const READ_NAME: &str = "read_name";
/// Read id column used when `read_name` is absent.
pub const READ_INDEX: &str = "read_index";
/// Reference coordinate column.
pub const POSITION: &str = "position";
/// Reference kmer column.
pub const REFERENCE_KMER: &str = "reference_kmer";
/// Model kmer column.
pub const MODEL_KMER: &str = "model_kmer";
/// Event dwell duration column.
pub const EVENT_LENGTH: &str = "event_length";
/// First raw signal sample index.
pub const START_IDX: &str = "start_idx";
/// Last raw signal sample index.
pub const END_IDX: &str = "end_idx";
/// Comma-separated raw signal samples.
pub const SAMPLES: &str = "samples";

/// Column positions of an eventalign header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Total number of columns every data row must have.
    pub n_fields: usize,
    pub ref_id: usize,
    pub read_id: usize,
    pub position: usize,
    pub ref_kmer: usize,
    pub model_kmer: usize,
    pub event_length: usize,
    /// `(start_idx, end_idx)` columns, present together or not at all.
    pub signal_bounds: Option<(usize, usize)>,
    pub samples: Option<usize>,
}

impl Schema {
    /// Resolves a tab-separated header line.
    ///
    /// A trailing newline or carriage return is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CollapseError::MissingColumn`] if a required column is absent,
    /// or [`CollapseError::UnpairedColumn`] if only one of `start_idx` and
    /// `end_idx` is present.
    ///
    /// # Example
    ///
    /// ```
    /// use eventalign_collapse::schema::Schema;
    ///
    /// let schema = Schema::from_header(
    ///     "contig\tposition\treference_kmer\tread_index\tmodel_kmer\tevent_length",
    /// )?;
    /// assert_eq!(schema.read_id, 3);
    /// assert!(!schema.has_samples());
    /// # Ok::<(), eventalign_collapse::error::CollapseError>(())
    /// ```
    pub fn from_header(header: &str) -> Result<Self> {
        let columns: Vec<&str> = header.trim_end_matches(['\n', '\r']).split('\t').collect();
        let find = |name: &str| columns.iter().position(|c| *c == name);
        let require = |name: &'static str| find(name).ok_or(CollapseError::MissingColumn { column: name });

        let ref_id = require(CONTIG)?;
        let read_id = find(READ_NAME)
            .or_else(|| find(READ_INDEX))
            .ok_or(CollapseError::MissingColumn { column: READ_NAME })?;

        let signal_bounds = match (find(START_IDX), find(END_IDX)) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(CollapseError::UnpairedColumn {
                    present: START_IDX,
                    missing: END_IDX,
                })
            }
            (None, Some(_)) => {
                return Err(CollapseError::UnpairedColumn {
                    present: END_IDX,
                    missing: START_IDX,
                })
            }
        };

        Ok(Self {
            n_fields: columns.len(),
            ref_id,
            read_id,
            position: require(POSITION)?,
            ref_kmer: require(REFERENCE_KMER)?,
            model_kmer: require(MODEL_KMER)?,
            event_length: require(EVENT_LENGTH)?,
            signal_bounds,
            samples: find(SAMPLES),
        })
    }

    /// Returns `true` if rows carry raw signal sample bounds.
    pub const fn has_signal_bounds(&self) -> bool {
        self.signal_bounds.is_some()
    }

    /// Returns `true` if rows carry raw signal samples.
    pub const fn has_samples(&self) -> bool {
        self.samples.is_some()
    }
}
