//! Aggregator stage: folds a run's events into kmers and renders its block.
//!
//! A block is self-contained text:
//!
//! ```text
//! #<read_id>\t<ref_id>
//! ref_pos\tref_kmer\tnum_events\tdwell_time\tnnnnn_dwell_time\tmismatch_dwell_time[...]
//! <one row per kmer>
//! ```

use std::fmt::Write;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::{
    error::{CollapseError, Result},
    event::Event,
    pipeline::{OutputItem, StageContext, WorkItem},
    reader::Run,
    schema::Schema,
    stats::{push_float, StatField},
};

/// Columns always present in a kmer row.
pub const BASE_COLUMNS: [&str; 6] = [
    "ref_pos",
    "ref_kmer",
    "num_events",
    "dwell_time",
    "nnnnn_dwell_time",
    "mismatch_dwell_time",
];

/// Output columns active for a run, fixed once from the schema and the
/// requested statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    signal_bounds: bool,
    stat_fields: Vec<StatField>,
    write_samples: bool,
    header: String,
}

impl Layout {
    /// Statistics and raw samples are dropped when the input has no `samples` column.
    pub fn new(schema: &Schema, stat_fields: &[StatField], write_samples: bool) -> Self {
        let signal_bounds = schema.has_signal_bounds();
        let (stat_fields, write_samples) = if schema.has_samples() {
            (stat_fields.to_vec(), write_samples)
        } else {
            (Vec::new(), false)
        };

        let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
        if signal_bounds {
            columns.extend(["start_idx", "end_idx"]);
        }
        columns.extend(stat_fields.iter().map(|f| f.name()));
        if write_samples {
            columns.push("samples");
        }

        Self {
            signal_bounds,
            stat_fields,
            write_samples,
            header: columns.join("\t"),
        }
    }

    /// The column header line, without its newline.
    pub fn header(&self) -> &str {
        &self.header
    }

    fn parses_samples(&self) -> bool {
        !self.stat_fields.is_empty()
    }
}

/// All contiguous events at one reference position within one read.
#[derive(Debug, Clone, PartialEq)]
pub struct KmerAggregate<'a> {
    pub ref_pos: i64,
    pub ref_kmer: &'a str,
    pub num_events: u64,
    pub dwell_time: f64,
    pub nnnnn_dwell_time: f64,
    pub mismatch_dwell_time: f64,
    /// Bounds of the last folded event.
    pub signal_bounds: Option<(i64, i64)>,
    pub samples: Vec<f64>,
    /// Raw samples text of every folded event, in arrival order.
    pub raw_samples: Vec<&'a str>,
}

impl<'a> KmerAggregate<'a> {
    fn start(event: &Event<'a>, line_no: u64, layout: &Layout) -> Result<Self> {
        let mut kmer = Self {
            ref_pos: event.ref_pos,
            ref_kmer: event.ref_kmer,
            num_events: 0,
            dwell_time: 0.0,
            nnnnn_dwell_time: 0.0,
            mismatch_dwell_time: 0.0,
            signal_bounds: None,
            samples: Vec::new(),
            raw_samples: Vec::new(),
        };
        kmer.fold(event, line_no, layout)?;
        Ok(kmer)
    }

    fn fold(&mut self, event: &Event<'a>, line_no: u64, layout: &Layout) -> Result<()> {
        self.num_events += 1;
        self.dwell_time += event.event_len;
        if event.is_nnnnn() {
            self.nnnnn_dwell_time += event.event_len;
        } else if event.is_mismatch() {
            self.mismatch_dwell_time += event.event_len;
        }
        // TODO: confirm with downstream users whether start_idx should be the
        // minimum over folded events; currently the last event wins.
        if event.signal_bounds.is_some() {
            self.signal_bounds = event.signal_bounds;
        }
        if layout.parses_samples() {
            event.extend_samples(line_no, &mut self.samples)?;
        }
        if layout.write_samples {
            if let Some(raw) = event.samples.filter(|s| !s.is_empty()) {
                self.raw_samples.push(raw);
            }
        }
        Ok(())
    }

    fn render(&self, layout: &Layout, out: &mut String) {
        let _ = write!(out, "{}\t{}\t{}\t", self.ref_pos, self.ref_kmer, self.num_events);
        push_float(out, self.dwell_time);
        out.push('\t');
        push_float(out, self.nnnnn_dwell_time);
        out.push('\t');
        push_float(out, self.mismatch_dwell_time);

        if layout.signal_bounds {
            let (start, end) = self.signal_bounds.unwrap_or_default();
            let _ = write!(out, "\t{start}\t{end}");
        }
        for field in &layout.stat_fields {
            out.push('\t');
            field.write_value(&self.samples, out);
        }
        if layout.write_samples {
            out.push('\t');
            for (i, raw) in self.raw_samples.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(raw);
            }
        }
        out.push('\n');
    }
}

/// Per-read summary, derived by folding all kmers of one read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAggregate {
    pub read_id: String,
    pub ref_id: String,
    pub dwell_time: f64,
    pub kmers: u64,
    pub nnnnn_kmers: u64,
    pub mismatch_kmers: u64,
    /// Reference positions inside `ref_start..ref_end` with no event.
    pub missing_kmers: u64,
    pub ref_start: i64,
    /// Exclusive end: last kmer position + 1.
    pub ref_end: i64,
}

impl ReadAggregate {
    fn new(run: &Run, ref_start: i64) -> Self {
        Self {
            read_id: run.read_id.clone(),
            ref_id: run.ref_id.clone(),
            dwell_time: 0.0,
            kmers: 0,
            nnnnn_kmers: 0,
            mismatch_kmers: 0,
            missing_kmers: 0,
            ref_start,
            ref_end: ref_start.saturating_add(1),
        }
    }

    fn close_kmer(&mut self, kmer: &KmerAggregate<'_>, layout: &Layout, block: &mut String) {
        self.kmers += 1;
        self.dwell_time += kmer.dwell_time;
        if kmer.nnnnn_dwell_time > 0.0 {
            self.nnnnn_kmers += 1;
        }
        if kmer.mismatch_dwell_time > 0.0 {
            self.mismatch_kmers += 1;
        }
        self.ref_end = kmer.ref_pos.saturating_add(1);
        kmer.render(layout, block);
    }
}

/// Collapses one run into its read summary and rendered block.
///
/// # Errors
///
/// Returns a parse error for the first malformed row in the run.
pub fn collapse_run(run: &Run, schema: &Schema, layout: &Layout) -> Result<(ReadAggregate, String)> {
    let Some((first, rest)) = run.lines.split_first() else {
        return Err(CollapseError::EmptyRun {
            read_id: run.read_id.clone(),
            ref_id: run.ref_id.clone(),
        });
    };

    let mut block = String::with_capacity(64 * (run.lines.len() + 2));
    let _ = writeln!(block, "#{}\t{}", run.read_id, run.ref_id);
    block.push_str(layout.header());
    block.push('\n');

    let mut kmer = KmerAggregate::start(&Event::parse(first, run.first_line, schema)?, run.first_line, layout)?;
    let mut read = ReadAggregate::new(run, kmer.ref_pos);

    for (line, line_no) in rest.iter().zip(run.first_line + 1..) {
        let event = Event::parse(line, line_no, schema)?;
        if event.ref_pos == kmer.ref_pos {
            kmer.fold(&event, line_no, layout)?;
        } else {
            read.close_kmer(&kmer, layout, &mut block);
            let jump = event.ref_pos.abs_diff(kmer.ref_pos);
            if jump >= 2 {
                read.missing_kmers = read.missing_kmers.saturating_add(jump - 1);
            }
            kmer = KmerAggregate::start(&event, line_no, layout)?;
        }
    }
    read.close_kmer(&kmer, layout, &mut block);

    Ok((read, block))
}

/// Aggregator stage body: collapses runs until its end marker, then emits one marker.
pub(crate) fn run_aggregator(
    rx: &Receiver<WorkItem>,
    tx: &Sender<OutputItem>,
    schema: &Schema,
    layout: &Layout,
    ctx: &StageContext,
) {
    let mut n_runs = 0u64;
    while let Some(WorkItem::Run(run)) = ctx.abort.recv(rx) {
        match collapse_run(&run, schema, layout) {
            Ok((read, block)) => {
                if !ctx.abort.send(tx, OutputItem::Block { read, block }) {
                    break;
                }
                n_runs += 1;
            }
            Err(err) => {
                ctx.fail(err);
                break;
            }
        }
    }
    ctx.abort.send_marker(tx, OutputItem::End);
    debug!(runs = n_runs, "aggregator finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "contig\tread_name\tposition\treference_kmer\tmodel_kmer\tevent_length";

    fn make_run(rows: &[(i64, &str, f64)]) -> Run {
        Run {
            read_id: "R1".to_string(),
            ref_id: "chr1".to_string(),
            first_line: 2,
            lines: rows
                .iter()
                .map(|(pos, model, len)| format!("chr1\tR1\t{pos}\tAAAAA\t{model}\t{len}"))
                .collect(),
        }
    }

    fn collapse_basic(rows: &[(i64, &str, f64)]) -> (ReadAggregate, String) {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &StatField::DEFAULT, false);
        collapse_run(&make_run(rows), &schema, &layout).unwrap()
    }

    #[test]
    fn folds_events_at_same_position() {
        let (read, block) = collapse_basic(&[(10, "AAAAA", 0.01), (10, "AAAAA", 0.02), (11, "AAAAA", 0.03)]);
        insta::assert_snapshot!(block, @r"
        #R1	chr1
        ref_pos	ref_kmer	num_events	dwell_time	nnnnn_dwell_time	mismatch_dwell_time
        10	AAAAA	2	0.03	0	0
        11	AAAAA	1	0.03	0	0
        ");
        assert_eq!(read.kmers, 2);
        assert_eq!(read.ref_start, 10);
        assert_eq!(read.ref_end, 12);
        assert_eq!(read.missing_kmers, 0);
        assert!((read.dwell_time - 0.06).abs() < 1e-9);
    }

    #[test]
    fn counts_missing_positions() {
        let (read, _) = collapse_basic(&[(10, "AAAAA", 0.01), (13, "AAAAA", 0.01), (14, "AAAAA", 0.01)]);
        assert_eq!(read.missing_kmers, 2);
        assert_eq!(read.kmers, 3);
        assert_eq!(read.ref_end, 15);
    }

    #[test]
    fn classifies_nnnnn_and_mismatch_dwell() {
        let (read, block) = collapse_basic(&[
            (10, "NNNNN", 0.5),
            (10, "AAAAC", 0.25),
            (10, "AAAAA", 0.125),
            (11, "AAAAA", 1.0),
        ]);
        let row = block.lines().nth(2).unwrap();
        assert_eq!(row, "10\tAAAAA\t3\t0.875\t0.5\t0.25");
        assert_eq!(read.nnnnn_kmers, 1);
        assert_eq!(read.mismatch_kmers, 1);
    }

    #[test]
    fn single_event_run() {
        let (read, block) = collapse_basic(&[(7, "AAAAA", 0.25)]);
        assert_eq!(block.lines().count(), 3);
        assert_eq!((read.ref_start, read.ref_end, read.kmers), (7, 8, 1));
    }

    #[test]
    fn stats_and_samples_columns() {
        let schema = Schema::from_header(&format!("{HEADER}\tstart_idx\tend_idx\tsamples")).unwrap();
        let layout = Layout::new(&schema, &[StatField::Mean, StatField::Count], true);
        let run = Run {
            read_id: "R1".to_string(),
            ref_id: "chr1".to_string(),
            first_line: 2,
            lines: vec![
                "chr1\tR1\t10\tAAAAA\tAAAAA\t0.5\t0\t3\t1.0,2.0,3.0".to_string(),
                "chr1\tR1\t10\tAAAAA\tAAAAA\t0.5\t3\t5\t4.0,5.0".to_string(),
            ],
        };
        let (_, block) = collapse_run(&run, &schema, &layout).unwrap();
        insta::assert_snapshot!(block, @r"
        #R1	chr1
        ref_pos	ref_kmer	num_events	dwell_time	nnnnn_dwell_time	mismatch_dwell_time	start_idx	end_idx	mean	count	samples
        10	AAAAA	2	1	0	0	3	5	3	5	1.0,2.0,3.0,4.0,5.0
        ");
    }

    #[test]
    fn no_stat_columns_without_samples() {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &[StatField::Mean, StatField::Mad], true);
        assert_eq!(layout.header(), BASE_COLUMNS.join("\t"));
    }

    #[test]
    fn malformed_row_fails_run() {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &[], false);
        let mut run = make_run(&[(10, "AAAAA", 0.01)]);
        run.lines.push("chr1\tR1\tx\tAAAAA\tAAAAA\t0.01".to_string());
        assert!(matches!(
            collapse_run(&run, &schema, &layout),
            Err(CollapseError::InvalidField { line: 3, .. })
        ));
    }
}
