//! Reader stage: groups contiguous rows into per-read runs.

use std::{io::BufRead, path::PathBuf, sync::Arc};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::{
    error::{CollapseError, Result},
    event::split_fields,
    input::{Input, LineSource},
    pipeline::{Abort, StageContext, WorkItem},
    schema::Schema,
};

/// A maximal block of contiguous rows sharing one (read id, reference id) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub read_id: String,
    pub ref_id: String,
    /// 1-based input line number of `lines[0]`.
    pub first_line: u64,
    /// Raw rows without their line terminators. Blank input lines are not
    /// included, so numbering is only exact for inputs without them.
    pub lines: Vec<String>,
}

impl Run {
    fn start(read_id: String, ref_id: String, line_no: u64, line: String) -> Self {
        Self {
            read_id,
            ref_id,
            first_line: line_no,
            lines: vec![line],
        }
    }
}

/// Reads and resolves the header line.
///
/// Returns the schema and the number of lines consumed.
///
/// # Errors
///
/// Returns [`CollapseError::MissingHeader`] on an empty stream, or any schema error.
pub fn read_schema<R: BufRead + ?Sized>(source: &mut R, input: &Input) -> Result<(Schema, u64)> {
    let mut header = String::new();
    let read = source
        .read_line(&mut header)
        .map_err(|source| CollapseError::InputRead {
            source,
            path: input.display_path(),
        })?;
    if read == 0 {
        return Err(CollapseError::MissingHeader);
    }
    Ok((Schema::from_header(&header)?, 1))
}

/// Iterator over the runs of an eventalign stream, positioned after the header.
///
/// With a read limit, yields at most that many complete runs: the row that
/// would start the next run ends the scan. Once attached to a raised abort,
/// the scan stops at the next line and the partial run is dropped.
pub struct Runs<R = LineSource> {
    source: R,
    schema: Arc<Schema>,
    path: PathBuf,
    line_no: u64,
    pending: Option<Run>,
    emitted: u64,
    max_reads: Option<u64>,
    abort: Option<Arc<Abort>>,
    done: bool,
}

impl<R: BufRead> Runs<R> {
    /// `lines_consumed` is the number of lines already read (the header).
    pub fn new(source: R, schema: Arc<Schema>, input: &Input, lines_consumed: u64, max_reads: Option<u64>) -> Self {
        Self {
            source,
            schema,
            path: input.display_path(),
            line_no: lines_consumed,
            pending: None,
            emitted: 0,
            max_reads,
            abort: None,
            done: false,
        }
    }

    /// Stops the scan as soon as `abort` is raised.
    pub(crate) fn cancel_on(mut self, abort: Arc<Abort>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(|abort| abort.is_raised())
    }

    fn at_limit(&self) -> bool {
        self.max_reads.is_some_and(|max| self.emitted >= max)
    }

    fn emit(&mut self, run: Run) -> Option<Result<Run>> {
        self.emitted += 1;
        if self.at_limit() {
            self.done = true;
        }
        Some(Ok(run))
    }

    fn fail(&mut self, err: CollapseError) -> Option<Result<Run>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for Runs<R> {
    type Item = Result<Run>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.at_limit() {
            return None;
        }

        loop {
            if self.aborted() {
                self.done = true;
                self.pending = None;
                return None;
            }

            let mut line = String::new();
            match self.source.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    let run = self.pending.take()?;
                    return self.emit(run);
                }
                Ok(_) => {}
                Err(source) => {
                    let path = self.path.clone();
                    return self.fail(CollapseError::InputRead { source, path });
                }
            }
            self.line_no += 1;

            let trimmed = line.trim_end_matches(['\n', '\r']).len();
            line.truncate(trimmed);
            if line.is_empty() {
                continue;
            }

            let new_ids = match split_fields(&line, self.line_no, &self.schema) {
                Ok(fields) => {
                    let (read_id, ref_id) = (fields[self.schema.read_id], fields[self.schema.ref_id]);
                    match &self.pending {
                        Some(run) if run.read_id == read_id && run.ref_id == ref_id => None,
                        _ => Some((read_id.to_string(), ref_id.to_string())),
                    }
                }
                Err(err) => return self.fail(err),
            };

            match new_ids {
                None => {
                    if let Some(run) = self.pending.as_mut() {
                        run.lines.push(line);
                    }
                }
                Some((read_id, ref_id)) => {
                    let next = Run::start(read_id, ref_id, self.line_no, line);
                    if let Some(done) = self.pending.replace(next) {
                        let result = self.emit(done);
                        if self.done {
                            self.pending = None;
                        }
                        return result;
                    }
                }
            }
        }
    }
}

/// Reader stage body: feeds runs to the work queue, then one end marker per aggregator.
pub(crate) fn run_reader<R: BufRead>(runs: Runs<R>, tx: &Sender<WorkItem>, aggregators: usize, ctx: &StageContext) {
    debug!("reader started");
    let mut n_runs = 0u64;

    for run in runs {
        match run {
            Ok(run) => {
                if !ctx.abort.send(tx, WorkItem::Run(run)) {
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

    for _ in 0..aggregators {
        ctx.abort.send_marker(tx, WorkItem::End);
    }
    info!(runs = n_runs, "reader finished");
}
