//! Writer stage: appends blocks to the output and rows to the index.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    aggregate::ReadAggregate,
    error::{CollapseError, Result},
    index::{IndexRecord, COMPLETION_SENTINEL, HEADER},
    pipeline::{OutputItem, StageContext},
    progress::ProgressTracker,
};

/// Counters reported by a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Read blocks written.
    pub reads: u64,
    /// Kmer rows written.
    pub kmers: u64,
    /// Size of the primary output, completion sentinel included.
    pub bytes_written: u64,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn reads_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.reads as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// The one-line run report, `total reads: N [X reads/s]`.
impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "total reads: {} [{:.2} reads/s]", self.reads, self.reads_per_second())
    }
}

/// Owns the output and index handles and tracks the running byte offset.
pub struct BlockWriter<O: Write = BufWriter<File>, I: Write = BufWriter<File>> {
    output: O,
    index: I,
    output_path: PathBuf,
    index_path: PathBuf,
    byte_offset: u64,
    reads: u64,
    kmers: u64,
    started: Instant,
}

impl BlockWriter {
    /// Creates (truncating) the output and index files.
    pub fn create(output_path: &Path, index_path: &Path) -> Result<Self> {
        let output = File::create(output_path).map_err(|source| CollapseError::OutputUnwritable {
            source,
            path: output_path.to_path_buf(),
        })?;
        let index = File::create(index_path).map_err(|source| CollapseError::OutputUnwritable {
            source,
            path: index_path.to_path_buf(),
        })?;
        Self::new(BufWriter::new(output), BufWriter::new(index), output_path, index_path)
    }
}

impl<O: Write, I: Write> BlockWriter<O, I> {
    /// Wraps already-open writers and writes the index header.
    pub fn new(output: O, mut index: I, output_path: &Path, index_path: &Path) -> Result<Self> {
        writeln!(index, "{HEADER}").map_err(|source| CollapseError::IndexWrite {
            source,
            path: index_path.to_path_buf(),
        })?;
        Ok(Self {
            output,
            index,
            output_path: output_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            byte_offset: 0,
            reads: 0,
            kmers: 0,
            started: Instant::now(),
        })
    }

    /// Appends one block and its index row.
    pub fn write_block(&mut self, read: &ReadAggregate, block: &str) -> Result<IndexRecord> {
        let byte_len = block.len() as u64;
        self.output
            .write_all(block.as_bytes())
            .map_err(|source| CollapseError::OutputWrite {
                source,
                path: self.output_path.clone(),
            })?;

        let record = IndexRecord::new(read, self.byte_offset, byte_len);
        record
            .write_row(&mut self.index)
            .map_err(|source| CollapseError::IndexWrite {
                source,
                path: self.index_path.clone(),
            })?;

        self.byte_offset += byte_len;
        self.reads += 1;
        self.kmers += read.kmers;
        Ok(record)
    }

    /// Writes the completion sentinel and flushes both files.
    pub fn finish(&mut self) -> Result<RunSummary> {
        let output_err = |source| CollapseError::OutputWrite {
            source,
            path: self.output_path.clone(),
        };
        self.output
            .write_all(COMPLETION_SENTINEL.as_bytes())
            .map_err(output_err)?;
        self.output.flush().map_err(output_err)?;
        self.index.flush().map_err(|source| CollapseError::IndexWrite {
            source,
            path: self.index_path.clone(),
        })?;

        Ok(RunSummary {
            reads: self.reads,
            kmers: self.kmers,
            bytes_written: self.byte_offset + COMPLETION_SENTINEL.len() as u64,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        })
    }

    /// Consumes the writer, returning the output and index writers.
    pub fn into_inner(self) -> (O, I) {
        (self.output, self.index)
    }
}

/// Writer stage body.
///
/// Drains the output queue until it has counted `aggregators` end markers,
/// then writes the sentinel and reports the summary. Exits silently on abort.
pub(crate) fn run_writer<O: Write, I: Write>(
    rx: &Receiver<OutputItem>,
    mut writer: BlockWriter<O, I>,
    aggregators: usize,
    progress: &ProgressTracker,
    ctx: &StageContext,
) {
    let mut ended = 0;
    while ended < aggregators {
        match ctx.abort.recv(rx) {
            Some(OutputItem::Block { read, block }) => {
                if ctx.abort.is_raised() {
                    break;
                }
                if let Err(err) = writer.write_block(&read, &block) {
                    ctx.fail(err);
                    return;
                }
                progress.record_read(read.kmers);
            }
            Some(OutputItem::End) => ended += 1,
            None => break,
        }
    }

    if ctx.abort.is_raised() || ended < aggregators {
        warn!("writer stopped before completion; output left without completion sentinel");
        return;
    }

    match writer.finish() {
        Ok(summary) => {
            debug!(reads = summary.reads, bytes = summary.bytes_written, "writer finished");
            ctx.complete(summary);
        }
        Err(err) => ctx.fail(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(read_id: &str, kmers: u64) -> ReadAggregate {
        ReadAggregate {
            read_id: read_id.to_string(),
            ref_id: "chr1".to_string(),
            dwell_time: 0.5,
            kmers,
            nnnnn_kmers: 0,
            mismatch_kmers: 0,
            missing_kmers: 0,
            ref_start: 10,
            ref_end: 10 + kmers as i64,
        }
    }

    fn writer() -> BlockWriter<Vec<u8>, Vec<u8>> {
        BlockWriter::new(Vec::new(), Vec::new(), Path::new("out.tsv"), Path::new("out.tsv.idx")).unwrap()
    }

    #[test]
    fn tracks_byte_offsets() {
        let mut w = writer();
        let first = "#R1\tchr1\nh\n10\n";
        let second = "#R2\tchr1\nh\n10\n11\n";
        let r1 = w.write_block(&read("R1", 1), first).unwrap();
        let r2 = w.write_block(&read("R2", 2), second).unwrap();
        assert_eq!((r1.byte_offset, r1.byte_len), (0, first.len() as u64));
        assert_eq!((r2.byte_offset, r2.byte_len), (first.len() as u64, second.len() as u64));

        let summary = w.finish().unwrap();
        assert_eq!(summary.reads, 2);
        assert_eq!(summary.kmers, 3);

        let (output, index) = w.into_inner();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, format!("{first}{second}#\n"));
        assert_eq!(summary.bytes_written, output.len() as u64);

        let index = String::from_utf8(index).unwrap();
        let mut lines = index.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(lines.next(), Some("chr1\t10\t11\tR1\t0.5\t1\t0\t0\t0\t0\t14"));
        assert_eq!(lines.next(), Some("chr1\t10\t12\tR2\t0.5\t2\t0\t0\t0\t14\t17"));
    }

    #[test]
    fn summary_line() {
        let summary = RunSummary {
            reads: 3,
            kmers: 6,
            bytes_written: 120,
            elapsed_secs: 0.5,
        };
        assert_eq!(summary.to_string(), "total reads: 3 [6.00 reads/s]");
    }

    #[test]
    fn byte_len_counts_utf8_bytes() {
        let mut w = writer();
        let block = "#Ré\tchr1\n";
        let record = w.write_block(&read("Ré", 0), block).unwrap();
        assert_eq!(record.byte_len, 10);
    }

    #[test]
    fn empty_run_has_only_sentinel() {
        let mut w = writer();
        let summary = w.finish().unwrap();
        assert_eq!(summary.reads, 0);
        let (output, index) = w.into_inner();
        assert_eq!(output, b"#\n");
        assert_eq!(String::from_utf8(index).unwrap(), format!("{HEADER}\n"));
    }
}
