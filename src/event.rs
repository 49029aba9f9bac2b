//! Parsing of single eventalign rows.

use crate::{
    error::{CollapseError, Result},
    schema::{self, Schema},
};

/// Model kmer value meaning "no model assignment" for the event.
pub const NNNNN: &str = "NNNNN";

/// One eventalign row, borrowing its text fields from the input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<'a> {
    pub ref_id: &'a str,
    pub read_id: &'a str,
    pub ref_pos: i64,
    pub ref_kmer: &'a str,
    pub model_kmer: &'a str,
    pub event_len: f64,
    /// `(start_idx, end_idx)` when the schema carries them.
    pub signal_bounds: Option<(i64, i64)>,
    /// Raw comma-separated samples text when the schema carries it.
    pub samples: Option<&'a str>,
}

impl<'a> Event<'a> {
    /// Parses a data row.
    ///
    /// `line_no` is the 1-based line number in the input, used for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CollapseError::FieldCount`] if the row does not have as many
    /// fields as the header, or [`CollapseError::InvalidField`] if a numeric
    /// column cannot be parsed.
    pub fn parse(line: &'a str, line_no: u64, schema: &Schema) -> Result<Self> {
        let fields = split_fields(line, line_no, schema)?;

        let signal_bounds = match schema.signal_bounds {
            Some((start, end)) => Some((
                parse_field(fields[start], line_no, schema::START_IDX)?,
                parse_field(fields[end], line_no, schema::END_IDX)?,
            )),
            None => None,
        };

        Ok(Self {
            ref_id: fields[schema.ref_id],
            read_id: fields[schema.read_id],
            ref_pos: parse_field(fields[schema.position], line_no, schema::POSITION)?,
            ref_kmer: fields[schema.ref_kmer],
            model_kmer: fields[schema.model_kmer],
            event_len: parse_field(fields[schema.event_length], line_no, schema::EVENT_LENGTH)?,
            signal_bounds,
            samples: schema.samples.map(|i| fields[i]),
        })
    }

    /// Returns `true` if no model kmer was assigned to this event.
    pub fn is_nnnnn(&self) -> bool {
        self.model_kmer == NNNNN
    }

    /// Returns `true` if the model kmer is assigned but differs from the reference kmer.
    pub fn is_mismatch(&self) -> bool {
        !self.is_nnnnn() && self.model_kmer != self.ref_kmer
    }

    /// Parses the samples text into `out`, appending in order.
    ///
    /// An empty samples field contributes nothing.
    pub fn extend_samples(&self, line_no: u64, out: &mut Vec<f64>) -> Result<()> {
        let Some(text) = self.samples else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        for value in text.split(',') {
            out.push(parse_field(value, line_no, schema::SAMPLES)?);
        }
        Ok(())
    }
}

/// Splits a row on tabs, checking the field count against the header.
pub(crate) fn split_fields<'a>(line: &'a str, line_no: u64, schema: &Schema) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
    if fields.len() == schema.n_fields {
        Ok(fields)
    } else {
        Err(CollapseError::FieldCount {
            line: line_no,
            expected: schema.n_fields,
            found: fields.len(),
        })
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, line_no: u64, column: &'static str) -> Result<T> {
    value.trim().parse().map_err(|_| CollapseError::InvalidField {
        line: line_no,
        column,
        value: value.to_string(),
    })
}
