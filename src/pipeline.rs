//! Parallel collapse pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  work queue  ┌──────────────┐  output queue  ┌──────────┐
//! │  Reader  │─────────────>│ Aggregator×N │───────────────>│  Writer  │──> output + .idx
//! └──────────┘  (bounded)   └──────────────┘   (bounded)    └──────────┘
//!       │                          │                              │
//!       └──────────────────────────┴──────── status ──────────────┴──> orchestrator
//! ```
//!
//! The reader emits runs in input order; aggregators race, so blocks reach the
//! writer in no particular order and consumers locate a read through the index.
//! The writer stops after it has counted one end marker per aggregator.
//!
//! The first stage to fail reports its error on the status channel and raises
//! the shared [`Abort`] signal, which wakes every stage blocked on a queue. No
//! stage writes anything after it observes the abort, so a failed run never
//! gets its completion sentinel.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use tracing::{debug, error, info, info_span};

use crate::{
    aggregate::{self, Layout, ReadAggregate},
    config::CollapseConfig,
    error::{CollapseError, Result},
    progress::ProgressTracker,
    reader::{self, Run, Runs},
    writer::{self, BlockWriter, RunSummary},
};

/// Item on the work queue.
#[derive(Debug)]
pub(crate) enum WorkItem {
    Run(Run),
    End,
}

/// Item on the output queue.
#[derive(Debug)]
pub(crate) enum OutputItem {
    Block { read: ReadAggregate, block: String },
    End,
}

/// What a stage reports to the orchestrator: the writer's summary on success,
/// or the error that stopped any stage.
pub(crate) type Status = Result<RunSummary>;

/// Pipeline-wide abort signal.
///
/// Raising it drops the only sender of `signal`, so every `select!` waiting on
/// `signal` becomes ready at once.
#[derive(Debug)]
pub(crate) struct Abort {
    raised: AtomicBool,
    signal: Receiver<()>,
    trigger: Mutex<Option<Sender<()>>>,
}

impl Abort {
    pub(crate) fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            raised: AtomicBool::new(false),
            signal,
            trigger: Mutex::new(Some(trigger)),
        }
    }

    /// Raises the abort. Idempotent.
    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.take();
        }
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Blocking send that gives up on abort. Returns `false` if the item was not sent.
    pub(crate) fn send<T>(&self, tx: &Sender<T>, item: T) -> bool {
        if self.is_raised() {
            return false;
        }
        select! {
            send(tx, item) -> res => res.is_ok(),
            recv(self.signal) -> _ => false,
        }
    }

    /// Sends an end marker; after an abort only a non-blocking attempt is made.
    pub(crate) fn send_marker<T>(&self, tx: &Sender<T>, marker: T) {
        if self.is_raised() {
            let _ = tx.try_send(marker);
        } else {
            self.send(tx, marker);
        }
    }

    /// Blocking receive that gives up on abort or disconnection.
    pub(crate) fn recv<T>(&self, rx: &Receiver<T>) -> Option<T> {
        select! {
            recv(rx) -> msg => msg.ok(),
            recv(self.signal) -> _ => None,
        }
    }
}

/// Per-thread handle to the status channel and the abort signal.
///
/// Dropping it while the thread is panicking reports
/// [`CollapseError::StagePanicked`], so a panic aborts the run like any other
/// failure.
pub(crate) struct StageContext {
    stage: &'static str,
    pub(crate) abort: Arc<Abort>,
    status: Sender<Status>,
}

impl StageContext {
    pub(crate) const fn new(stage: &'static str, abort: Arc<Abort>, status: Sender<Status>) -> Self {
        Self {
            stage,
            abort,
            status,
        }
    }

    /// Reports `err` and raises the abort, in that order, so the orchestrator
    /// sees this error before anything caused by the abort.
    pub(crate) fn fail(&self, err: CollapseError) {
        error!(stage = self.stage, error = %err, "stage failed");
        let _ = self.status.send(Err(err));
        self.abort.raise();
    }

    pub(crate) fn complete(&self, summary: RunSummary) {
        let _ = self.status.send(Ok(summary));
    }
}

impl Drop for StageContext {
    fn drop(&mut self) {
        if thread::panicking() {
            self.fail(CollapseError::StagePanicked { stage: self.stage });
        }
    }
}

/// Collapses the configured input, blocking until the run completes or fails.
///
/// # Errors
///
/// Returns the first error raised by any stage. On error the output file is
/// left without its completion sentinel and must be treated as invalid.
///
/// # Example
///
/// ```rust,no_run
/// use eventalign_collapse::{config::CollapseConfig, input::Input, pipeline::collapse};
/// use std::path::Path;
///
/// let config = CollapseConfig::new(
///     Input::from_path(Path::new("eventalign.tsv")),
///     "collapsed.tsv",
///     4,
///     0,
/// )?;
/// let summary = collapse(&config)?;
/// println!("collapsed {} reads", summary.reads);
/// # Ok::<(), eventalign_collapse::error::CollapseError>(())
/// ```
pub fn collapse(config: &CollapseConfig) -> Result<RunSummary> {
    collapse_with_progress(config, Arc::new(ProgressTracker::new()))
}

/// Like [`collapse`], updating `progress` after every block written.
pub fn collapse_with_progress(config: &CollapseConfig, progress: Arc<ProgressTracker>) -> Result<RunSummary> {
    let _span = info_span!("collapse", input = %config.input, aggregators = config.aggregators).entered();

    let mut source = config.input.open()?;
    let (schema, header_lines) = reader::read_schema(&mut source, &config.input)?;
    let schema = Arc::new(schema);
    let layout = Arc::new(Layout::new(&schema, &config.stat_fields, config.write_samples));
    debug!(?schema, "resolved input header");

    let block_writer = BlockWriter::create(&config.output, &config.index_path())?;
    let abort = Arc::new(Abort::new());
    let runs = Runs::new(source, Arc::clone(&schema), &config.input, header_lines, config.max_reads)
        .cancel_on(Arc::clone(&abort));

    let (work_tx, work_rx) = bounded::<WorkItem>(config.queue_capacity);
    let (output_tx, output_rx) = bounded::<OutputItem>(config.queue_capacity);
    let (status_tx, status_rx) = unbounded::<Status>();

    let stage = |name: &'static str| StageContext::new(name, Arc::clone(&abort), status_tx.clone());
    let mut handles = Vec::with_capacity(config.aggregators + 2);

    let reader_handle = {
        let ctx = stage("reader");
        let aggregators = config.aggregators;
        spawn("reader", move || reader::run_reader(runs, &work_tx, aggregators, &ctx))?
    };

    for i in 0..config.aggregators {
        let ctx = stage("aggregator");
        let rx = work_rx.clone();
        let tx = output_tx.clone();
        let schema = Arc::clone(&schema);
        let layout = Arc::clone(&layout);
        match spawn(&format!("aggregator-{i}"), move || {
            aggregate::run_aggregator(&rx, &tx, &schema, &layout, &ctx);
        }) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                abort.raise();
                return Err(err);
            }
        }
    }
    drop(work_rx);
    drop(output_tx);

    {
        let ctx = stage("writer");
        let aggregators = config.aggregators;
        match spawn("writer", move || {
            writer::run_writer(&output_rx, block_writer, aggregators, &progress, &ctx);
        }) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                abort.raise();
                return Err(err);
            }
        }
    }
    drop(status_tx);

    let status = status_rx
        .recv()
        .unwrap_or(Err(CollapseError::StagePanicked { stage: "pipeline" }));

    match status {
        Ok(summary) => {
            for handle in handles {
                let _ = handle.join();
            }
            let _ = reader_handle.join();
            info!(
                reads = summary.reads,
                kmers = summary.kmers,
                reads_per_sec = summary.reads_per_second(),
                "collapse finished"
            );
            Ok(summary)
        }
        Err(err) => {
            abort.raise();
            for handle in handles {
                let _ = handle.join();
            }
            // The reader stops at its next line once the abort is raised. A
            // stdin read can block indefinitely, so that reader is left to
            // exit on its own.
            if config.input.is_file() || reader_handle.is_finished() {
                let _ = reader_handle.join();
            }
            Err(err)
        }
    }
}

fn spawn<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| CollapseError::ThreadSpawn { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn abort_wakes_blocked_receiver() {
        let abort = Arc::new(Abort::new());
        let (_tx, rx) = bounded::<u32>(1);

        let waiter = {
            let abort = Arc::clone(&abort);
            thread::spawn(move || abort.recv(&rx))
        };
        thread::sleep(Duration::from_millis(20));
        abort.raise();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn abort_wakes_blocked_sender() {
        let abort = Arc::new(Abort::new());
        let (tx, _rx) = bounded::<u32>(1);
        assert!(abort.send(&tx, 1));

        let waiter = {
            let abort = Arc::clone(&abort);
            thread::spawn(move || abort.send(&tx, 2))
        };
        thread::sleep(Duration::from_millis(20));
        abort.raise();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn send_after_abort_is_refused() {
        let abort = Abort::new();
        let (tx, rx) = bounded::<u32>(4);
        abort.raise();
        abort.raise();
        assert!(abort.is_raised());
        assert!(!abort.send(&tx, 1));
        abort.send_marker(&tx, 2);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[test]
    fn failure_is_reported_before_abort() {
        let abort = Arc::new(Abort::new());
        let (status_tx, status_rx) = unbounded();
        let ctx = StageContext::new("test", Arc::clone(&abort), status_tx);
        ctx.fail(CollapseError::MissingHeader);
        assert!(abort.is_raised());
        assert!(matches!(status_rx.try_recv().unwrap(), Err(CollapseError::MissingHeader)));
    }

    #[test]
    fn panic_is_reported_as_error() {
        let abort = Arc::new(Abort::new());
        let (status_tx, status_rx) = unbounded();
        let handle = {
            let abort = Arc::clone(&abort);
            thread::spawn(move || {
                let _ctx = StageContext::new("aggregator", abort, status_tx);
                panic!("boom");
            })
        };
        assert!(handle.join().is_err());
        assert!(abort.is_raised());
        assert!(matches!(
            status_rx.try_recv().unwrap(),
            Err(CollapseError::StagePanicked {
                stage: "aggregator"
            })
        ));
    }
}
