//! Collaborator seams: item fetching and artifact packaging.
//!
//! The runner never talks to the network or the file system itself. It hands a batch's items
//! to an [`ItemFetcher`] and the fetched subset to a [`Packager`], and awaits both.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ArtifactHandle, WorkItem};

/// Progress channel handed to [`ItemFetcher::fetch`].
///
/// Each report carries the number of items fetched so far in the current batch. Reports are
/// drained by the runner while the fetch is in flight and once more before the batch completes.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: mpsc::Sender<usize>,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<usize>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// A reporter whose reports go nowhere.
    pub fn detached() -> Self {
        let (reporter, _rx) = Self::channel(1);
        reporter
    }

    /// Report the number of items fetched so far.
    pub async fn report(&self, completed: usize) {
        // A closed receiver only means nobody is watching progress anymore
        let _ = self.tx.send(completed).await;
    }
}

/// Fetches the content of work items.
///
/// Implementations are best effort: they return the successfully fetched items (content filled
/// in) in their original relative order and only fail for batch-level problems such as the
/// network being unreachable.
#[async_trait::async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Fetch `items`, reporting progress through `progress`.
    ///
    /// `timeout` is the run's `network_timeout_threshold` and bounds each network request.
    async fn fetch(
        &self,
        items: &[WorkItem],
        timeout: Duration,
        progress: ProgressReporter,
    ) -> Result<Vec<WorkItem>>;
}

/// Receipt returned by [`ArchiveBuilder::finish`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// File name of the persisted artifact
    pub filename: String,
    /// Handle to release once the artifact is no longer needed
    pub handle: ArtifactHandle,
    /// Items written into the artifact
    pub item_count: usize,
}

/// An artifact under construction
#[async_trait::async_trait]
pub trait ArchiveBuilder: Send {
    /// Add one item. Returns `Ok(false)` when the item has no content and was skipped.
    async fn add_item(&mut self, item: &WorkItem) -> Result<bool>;

    /// Finalize and persist the artifact.
    async fn finish(self: Box<Self>) -> Result<PackagedArtifact>;
}

/// Bundles fetched items into persisted artifacts.
#[async_trait::async_trait]
pub trait Packager: Send + Sync {
    /// Start a new artifact called `name` (without extension).
    async fn open(&self, name: &str) -> Result<Box<dyn ArchiveBuilder>>;

    /// Release a handle returned earlier. Releasing twice is a no-op.
    async fn release(&self, handle: &ArtifactHandle);
}

/// Name of the artifact produced for the batch at `batch_index` (0-based).
pub fn batch_artifact_name(base_name: &str, batch_index: usize) -> String {
    format!("{}_batch_{}", base_name, batch_index + 1)
}

/// Package one batch's fetched items. Any item error aborts the artifact.
pub async fn package_batch(
    packager: &dyn Packager,
    items: &[WorkItem],
    batch_index: usize,
    base_name: &str,
) -> Result<PackagedArtifact> {
    let mut archive = packager
        .open(&batch_artifact_name(base_name, batch_index))
        .await?;
    for item in items {
        archive.add_item(item).await?;
    }
    archive.finish().await
}
