//! # autobatch
//!
//! Adaptive batch runner for fetching and packaging large lists of work items.
//!
//! ## Design Philosophy
//!
//! autobatch is designed to be:
//! - **Sequential and bounded** - One batch at a time, with a delay between batches
//! - **Resilient** - Failed batches are retried, persistent failures pause the run
//! - **Adaptive** - The batch size follows the observed success rate and latency
//! - **Event-driven** - Consumers subscribe to events or pull snapshots of the run state
//!
//! The runner itself never touches the network or the disk. Fetching and packaging go through
//! the [`ItemFetcher`] and [`Packager`] traits; [`HttpFetcher`] and [`ZipPackager`] are the
//! bundled implementations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use autobatch::{BatchConfig, BatchRunner, ConfigOverrides, HttpFetcher, WorkItem, ZipPackager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default();
//!     let fetcher = Arc::new(HttpFetcher::new(&config)?);
//!     let packager = Arc::new(ZipPackager::new("./archives"));
//!     let runner = BatchRunner::new(config, fetcher, packager)?;
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let items = vec![
//!         WorkItem::new("1", "Release notes", 1_709_294_400)
//!             .with_url("https://example.com/posts/1"),
//!     ];
//!     runner.start(items, "digest", ConfigOverrides::default()).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Collaborator traits for fetching and packaging
pub mod collab;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP item fetcher
pub mod fetcher;
/// Zip packaging
pub mod packaging;
/// Batch planning
pub mod planner;
/// Run-level progress aggregation
pub mod progress;
/// Retry classification and cancellable delays
pub mod retry;
/// Batch run controller (decomposed into focused submodules)
pub mod runner;
/// Adaptive batch sizing
pub mod sizer;
/// Core types
pub mod types;

// Re-export commonly used types
pub use collab::{
    ArchiveBuilder, ItemFetcher, PackagedArtifact, Packager, ProgressReporter, batch_artifact_name,
};
pub use config::{BatchConfig, ConfigOverrides};
pub use error::{Error, Result};
pub use fetcher::HttpFetcher;
pub use packaging::ZipPackager;
pub use retry::IsRetryable;
pub use runner::BatchRunner;
pub use types::{
    ArtifactHandle, Batch, BatchStats, CompletedArtifact, Event, OverallState, Status, WorkItem,
};
