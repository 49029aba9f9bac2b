//! Async collapse API using Tokio.
//!
//! The pipeline runs on its own threads; these wrappers move the blocking
//! orchestration onto Tokio's blocking pool so async callers are not stalled.
//!
//! # Feature Flag
//!
//! This module requires the `async` feature to be enabled:
//!
//! ```toml
//! [dependencies]
//! eventalign-collapse = { version = "0.1", features = ["async"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use eventalign_collapse::{async_api::collapse_async, builder::Collapser};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Collapser::new()
//!         .input("eventalign.tsv")
//!         .output("collapsed.tsv")
//!         .config()?;
//!     let summary = collapse_async(config).await?;
//!     println!("collapsed {} reads", summary.reads);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::task;

use crate::{
    config::CollapseConfig,
    pipeline::{collapse, collapse_with_progress},
    progress::ProgressTracker,
    writer::RunSummary,
};

/// Async version of [`collapse`](crate::pipeline::collapse).
///
/// # Errors
///
/// Returns the pipeline's error, or a join error if the blocking task panicked.
pub async fn collapse_async(
    config: CollapseConfig,
) -> Result<RunSummary, Box<dyn std::error::Error + Send + Sync>> {
    Ok(task::spawn_blocking(move || collapse(&config)).await??)
}

/// Async version of [`collapse_with_progress`](crate::pipeline::collapse_with_progress).
///
/// The tracker can be polled from async code while the run is in flight.
///
/// # Errors
///
/// Returns the pipeline's error, or a join error if the blocking task panicked.
pub async fn collapse_with_progress_async(
    config: CollapseConfig,
    progress: Arc<ProgressTracker>,
) -> Result<RunSummary, Box<dyn std::error::Error + Send + Sync>> {
    Ok(task::spawn_blocking(move || collapse_with_progress(&config, progress)).await??)
}
