//! # eventalign-collapse
//!
//! Collapses nanopolish eventalign output, which carries one row per signal
//! event, into one row per reference kmer per read, and writes a byte-offset
//! index so any read's block can be fetched without scanning the output.
//!
//! ## Pipeline
//!
//! A reader thread groups contiguous rows into per-read runs, a pool of
//! aggregator threads collapses runs into text blocks, and a writer thread
//! appends blocks to the output and rows to `<output>.idx`. Blocks arrive in
//! completion order; the index is the source of truth for locating a read.
//! A finished output ends with the sentinel line `#`, which is never written
//! when any stage fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventalign_collapse::builder::Collapser;
//!
//! let summary = Collapser::new()
//!     .input("eventalign.tsv")
//!     .output("collapsed.tsv")
//!     .threads(8)
//!     .run()?;
//! println!("{} reads, {} kmers", summary.reads, summary.kmers);
//! # Ok::<(), eventalign_collapse::error::CollapseError>(())
//! ```
//!
//! ## Reading the output back
//!
//! ```rust,no_run
//! use eventalign_collapse::index::{fetch_block, is_complete, load_index};
//!
//! assert!(is_complete("collapsed.tsv")?);
//! for record in load_index("collapsed.tsv.idx")? {
//!     let block = fetch_block("collapsed.tsv", &record)?;
//!     println!("{}: {} bytes", record.read_id, block.len());
//! }
//! # Ok::<(), eventalign_collapse::error::CollapseError>(())
//! ```
//!
//! ## Features
//!
//! - `gzip`: read `.gz` eventalign input
//! - `async`: Tokio wrappers in [`async_api`]

pub mod aggregate;
#[cfg(feature = "async")]
pub mod async_api;
pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod index;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod schema;
pub mod stats;
pub mod writer;

pub use builder::Collapser;
pub use config::CollapseConfig;
pub use error::{CollapseError, Result};
pub use index::{fetch_block, is_complete, load_index, IndexRecord};
pub use pipeline::{collapse, collapse_with_progress};
pub use writer::RunSummary;
