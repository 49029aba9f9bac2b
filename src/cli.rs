//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

use crate::{
    config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS},
    stats::StatField,
};

/// Collapse nanopolish eventalign output from per-event rows to per-kmer rows.
///
/// Writes the collapsed blocks to OUTPUT and a byte-offset read index to
/// OUTPUT.idx. A complete output ends with a line holding a single `#`.
#[derive(Parser, Debug)]
#[command(name = "eventalign-collapse")]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// Eventalign TSV to collapse (use '-' or omit for stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Collapsed output file; the index is written next to it with an .idx suffix
    #[arg(short, long)]
    pub output: PathBuf,

    /// Total worker threads, including the reader and the writer (minimum 3)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub threads: usize,

    /// Stop after this many reads (0 for no limit)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub max_reads: u64,

    /// Append the raw samples of each kmer as the last column
    #[arg(short = 's', long)]
    pub write_samples: bool,

    /// Comma-separated per-kmer statistics computed from the samples
    #[arg(
        short = 'f',
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = StatField::DEFAULT
    )]
    pub stat_fields: Vec<StatField>,

    /// Capacity of the work and output queues
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log progress while collapsing
    #[arg(long)]
    pub progress: bool,

    /// Write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["eventalign-collapse", "-o", "out.tsv"]).unwrap();
        assert_eq!(args.input, None);
        assert_eq!(args.threads, DEFAULT_WORKERS);
        assert_eq!(args.max_reads, 0);
        assert!(!args.write_samples);
        assert_eq!(args.stat_fields, StatField::DEFAULT.to_vec());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn parses_stat_list() {
        let args = Args::try_parse_from([
            "eventalign-collapse",
            "-o",
            "out.tsv",
            "-f",
            "std,mad,n_signals",
            "-vv",
        ])
        .unwrap();
        assert_eq!(
            args.stat_fields,
            vec![StatField::Std, StatField::Mad, StatField::Count]
        );
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn rejects_unknown_stat() {
        assert!(Args::try_parse_from(["eventalign-collapse", "-o", "out.tsv", "-f", "variance"]).is_err());
    }

    #[test]
    fn output_is_required() {
        assert!(Args::try_parse_from(["eventalign-collapse"]).is_err());
    }
}
