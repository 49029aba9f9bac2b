use std::{fs::File, io::BufWriter, path::Path, process, sync::Arc};

use clap::Parser;
use colored::Colorize;
use eventalign_collapse::{
    cli::Args,
    config::CollapseConfig,
    error::{CollapseError, Result},
    input::Input,
    logging,
    pipeline::collapse_with_progress,
    progress::ProgressTracker,
    writer::RunSummary,
};
use tracing::info;

/// Reads between progress log lines.
const PROGRESS_INTERVAL: u64 = 10_000;

fn main() {
    let args = Args::parse();
    logging::init(args.verbose.max(u8::from(args.progress)));

    let config = build_config(&args).unwrap_or_else(|e| {
        eprintln!();
        eprintln!(
            "{}\n {}",
            "Problem parsing arguments:".blue().bold(),
            e.to_string().blue()
        );
        eprintln!();
        eprintln!(
            "{}\n {}",
            "Help menu:".blue().bold(),
            "$ eventalign-collapse --help".bold()
        );
        eprintln!();
        process::exit(1);
    });

    if let Err(e) = run(&args, &config) {
        eprintln!(
            "{}\n {}",
            "Application error:".blue().bold(),
            e.to_string().blue()
        );
        process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<CollapseConfig> {
    let input = Input::from_option(args.input.as_deref());
    let mut config = CollapseConfig::new(input, &args.output, args.threads, args.max_reads)?
        .with_queue_capacity(args.queue_capacity)?;
    config.write_samples = args.write_samples;
    config.stat_fields.clone_from(&args.stat_fields);
    Ok(config)
}

fn run(args: &Args, config: &CollapseConfig) -> Result<()> {
    let progress = if args.progress {
        ProgressTracker::with_callback(|p| {
            if p.reads_written % PROGRESS_INTERVAL == 0 {
                info!(kmers = p.kmers_written, "{} reads written", p.reads_written);
            }
        })
    } else {
        ProgressTracker::new()
    };

    let summary = collapse_with_progress(config, Arc::new(progress))?;
    eprintln!("{summary}");

    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
    }
    Ok(())
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path).map_err(|source| CollapseError::OutputUnwritable {
        source,
        path: path.to_path_buf(),
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}
