//! Error types for autobatch
//!
//! Run-state errors (`ConcurrentRun`, `NoActiveRun`) are returned by the control operations,
//! batch-level errors (`Fetch`, `Package`) come back from collaborators and are retried by the
//! runner, and `NoSuccessfulItems` is the single summarizing error of a failed run.

use thiserror::Error;

/// Result type alias for autobatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for autobatch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// A run is already active (or still unwinding after cancellation)
    #[error("a batch run is already in progress")]
    ConcurrentRun,

    /// The requested control operation needs an active run
    #[error("cannot {operation}: no active batch run")]
    NoActiveRun {
        /// The operation that was attempted (e.g., "pause", "resume", "cancel")
        operation: String,
    },

    /// A batch used up all of its retries
    #[error("batch {batch_id} failed after {retries} retries: {last_error}")]
    RetryExhausted {
        /// Identifier of the exhausted batch
        batch_id: String,
        /// Number of retries that were performed
        retries: u32,
        /// Error message of the last failed attempt
        last_error: String,
    },

    /// The whole run finished without producing a single artifact
    #[error("no items were fetched and packaged successfully")]
    NoSuccessfulItems,

    /// `retry_failed` was called but no batch is in the failed state
    #[error("no failed items to retry")]
    NothingToRetry,

    /// Batch-level fetch failure reported by an [`ItemFetcher`](crate::collab::ItemFetcher)
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Packaging failure reported by a [`Packager`](crate::collab::Packager)
    #[error("packaging error: {0}")]
    Package(String),

    /// The one-shot packing path observed a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// HTTP error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive writer error
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn no_active_run(operation: &str) -> Self {
        Error::NoActiveRun {
            operation: operation.to_string(),
        }
    }

    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
