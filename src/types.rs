//! Core types and events for autobatch

use serde::{Deserialize, Serialize};

/// Current wall-clock time in unix milliseconds
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A single unit of work
///
/// Owned by the caller. `content` is absent until a fetcher fills it in; `title` and
/// `published_at` are only used to name entries inside the packaged artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Publication time (unix seconds)
    pub published_at: i64,
    /// Where the content can be fetched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Fetched content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WorkItem {
    /// Create an item without url or content
    pub fn new(id: impl Into<String>, title: impl Into<String>, published_at: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            published_at,
            url: None,
            content: None,
        }
    }

    /// Set the source url
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the fetched content
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Whether the item carries content that can be packaged
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }
}

/// Lifecycle status shared by batches and the run as a whole
///
/// Batches only ever use `Pending`, `Running`, `Completed` and `Failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting to start
    #[default]
    Pending,
    /// In progress
    Running,
    /// Paused by the user or by the consecutive-failure safety valve
    Paused,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped by the user
    Cancelled,
}

impl Status {
    /// Whether this status ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

/// A contiguous slice of work items processed as one unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Identifier, unique within a run
    pub id: String,
    /// Items in original order
    pub items: Vec<WorkItem>,
    /// Current status
    pub status: Status,
    /// Progress of the current attempt (0.0 to 100.0)
    pub progress: f64,
    /// Items fetched successfully in the current attempt
    pub completed_count: usize,
    /// Items that could not be fetched in the last finished attempt
    pub failed_count: usize,
    /// Retries performed so far
    pub retry_count: u32,
    /// Error of the last failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start of the current attempt (unix ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    /// End of the last finished attempt (unix ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

impl Batch {
    /// Create a pending batch
    pub fn new(id: impl Into<String>, items: Vec<WorkItem>) -> Self {
        Self {
            id: id.into(),
            items,
            status: Status::Pending,
            progress: 0.0,
            completed_count: 0,
            failed_count: 0,
            retry_count: 0,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wall-clock duration of the last attempt when both timestamps are known
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).max(0)),
            _ => None,
        }
    }

    /// Clear per-attempt state before a retry.
    pub(crate) fn reset_for_retry(&mut self) {
        self.status = Status::Pending;
        self.progress = 0.0;
        self.completed_count = 0;
        self.error = None;
    }
}

/// Opaque reference to a packaged artifact held by a [`Packager`](crate::collab::Packager)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(pub u64);

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "artifact-{}", self.0)
    }
}

/// Receipt for one persisted batch artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedArtifact {
    /// File name of the artifact
    pub filename: String,
    /// Index of the batch that produced it
    pub batch_index: usize,
    /// Number of fetched items it was built from
    pub item_count: usize,
    /// Handle to release when the artifact is no longer needed
    pub handle: ArtifactHandle,
    /// Creation time (unix ms)
    pub created_at: i64,
}

/// Run-level aggregate, recomputed after every batch and progress tick
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallState {
    /// Run status
    pub status: Status,
    /// Items in the run
    pub total_articles: usize,
    /// Items accounted as done (approximation, see [`crate::progress`])
    pub completed_articles: usize,
    /// Items that ended up unfetched
    pub failed_articles: usize,
    /// Number of completed batches
    pub current_batch_index: usize,
    /// Batches planned for the run
    pub total_batches: usize,
    /// Overall progress (0.0 to 100.0)
    pub overall_progress: f64,
    /// Estimated remaining time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
    /// Throughput in items per minute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_speed: Option<f64>,
    /// Progress of the one-shot packing path (0.0 to 100.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packing_progress: Option<f64>,
    /// Items packed by the one-shot packing path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packing_count: Option<usize>,
    /// Artifacts produced so far
    pub completed_artifacts: Vec<CompletedArtifact>,
}

/// Derived statistics over the batch list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Batches in the completed state
    pub completed_batches: usize,
    /// Batches in the failed state
    pub failed_batches: usize,
    /// All batches of the run
    pub total_batches: usize,
    /// Completed batches as a percentage of all batches
    pub batch_success_rate: f64,
    /// Live batch size after adaptive sizing
    pub current_batch_size: usize,
    /// Retries summed over all batches
    pub total_retries: u32,
}

impl BatchStats {
    pub(crate) fn from_batches(batches: &[Batch], current_batch_size: usize) -> Self {
        let completed_batches = batches
            .iter()
            .filter(|b| b.status == Status::Completed)
            .count();
        let failed_batches = batches
            .iter()
            .filter(|b| b.status == Status::Failed)
            .count();
        let total_batches = batches.len();
        let batch_success_rate = if total_batches > 0 {
            completed_batches as f64 / total_batches as f64 * 100.0
        } else {
            0.0
        };

        Self {
            completed_batches,
            failed_batches,
            total_batches,
            batch_success_rate,
            current_batch_size,
            total_retries: batches.iter().map(|b| b.retry_count).sum(),
        }
    }
}

/// Event emitted during a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run was planned and started
    RunStarted {
        /// Items in the run
        total_items: usize,
        /// Planned batches
        total_batches: usize,
        /// Initial batch size
        batch_size: usize,
    },

    /// A batch attempt started
    BatchStarted {
        /// Batch index
        batch_index: usize,
        /// Batch identifier
        batch_id: String,
        /// Items in the batch
        item_count: usize,
    },

    /// The fetcher reported progress
    BatchProgress {
        /// Batch index
        batch_index: usize,
        /// Items fetched so far
        completed: usize,
        /// Items in the batch
        total: usize,
        /// Overall run progress (0.0 to 100.0)
        overall_percent: f64,
    },

    /// A batch attempt finished
    BatchCompleted {
        /// Batch index
        batch_index: usize,
        /// Items fetched
        succeeded: usize,
        /// Items not fetched
        failed: usize,
    },

    /// A failed batch is going to be retried
    BatchRetrying {
        /// Batch index
        batch_index: usize,
        /// Retry number (1-based)
        attempt: u32,
        /// Delay before the retry in milliseconds
        delay_ms: u64,
    },

    /// A batch failed for good
    BatchFailed {
        /// Batch index
        batch_index: usize,
        /// Error message
        error: String,
    },

    /// An artifact was packaged and persisted
    ArtifactCreated {
        /// The new artifact
        artifact: CompletedArtifact,
    },

    /// Adaptive sizing changed the live batch size
    BatchSizeAdjusted {
        /// Previous size
        from: usize,
        /// New size
        to: usize,
        /// Success rate that drove the decision (0.0 to 1.0)
        success_rate: f64,
    },

    /// The run was paused
    Paused {
        /// Paused by the consecutive-failure safety valve rather than the user
        automatic: bool,
    },

    /// The run was resumed
    Resumed,

    /// The run was cancelled
    Cancelled,

    /// The run finished with at least one artifact
    RunCompleted {
        /// Artifacts produced
        artifacts: usize,
        /// Items packaged across all artifacts
        items: usize,
    },

    /// The run failed
    RunFailed {
        /// Error message
        error: String,
    },

    /// Batches and artifacts were cleared
    StateCleared,
}
