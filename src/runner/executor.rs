//! Single batch execution: fetch, drain progress, package, record the artifact.

use crate::collab::{ProgressReporter, package_batch};
use crate::error::{Error, Result};
use crate::types::{CompletedArtifact, Event, Status, now_ms};

use super::BatchRunner;

/// Buffered progress reports per batch before the fetcher awaits the runner
const PROGRESS_CHANNEL_BUFFER: usize = 64;

impl BatchRunner {
    /// Run one attempt of the batch at `index`.
    ///
    /// The attempt is never interrupted by cancellation: once the fetch started, its results are
    /// packaged and recorded. On error the batch is left `Failed` with the error recorded and the
    /// error is returned for the retry manager to classify.
    pub(crate) async fn execute_batch(&self, index: usize, base_name: &str) -> Result<()> {
        let (batch_id, items, timeout) = {
            let mut state = self.state.write().await;
            let batch = state.batch_mut(index)?;
            batch.status = Status::Running;
            batch.progress = 0.0;
            batch.completed_count = 0;
            batch.start_time = Some(now_ms());
            batch.end_time = None;
            let (batch_id, items) = (batch.id.clone(), batch.items.clone());
            let snapshot = (batch_id, items, state.config.network_timeout_threshold);
            state.refresh_progress();
            snapshot
        };

        tracing::info!(
            batch_id = %batch_id,
            batch_index = index,
            items = items.len(),
            "Starting batch"
        );
        self.emit(Event::BatchStarted {
            batch_index: index,
            batch_id: batch_id.clone(),
            item_count: items.len(),
        });

        let (reporter, mut progress_rx) = ProgressReporter::channel(PROGRESS_CHANNEL_BUFFER);
        let fetch = self.fetcher.fetch(&items, timeout, reporter);
        tokio::pin!(fetch);

        // Apply progress while the fetch is in flight
        let fetched = loop {
            tokio::select! {
                biased;
                Some(done) = progress_rx.recv() => {
                    self.apply_progress(index, done, items.len()).await?;
                }
                result = &mut fetch => break result,
            }
        };

        // Reports sent right before the fetch returned
        while let Ok(done) = progress_rx.try_recv() {
            self.apply_progress(index, done, items.len()).await?;
        }

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.fail_batch(index, &e).await?;
                return Err(e);
            }
        };

        let succeeded = fetched.len();
        let failed = items.len().saturating_sub(succeeded);

        let packaged = if fetched.is_empty() {
            None
        } else {
            match package_batch(self.packager.as_ref(), &fetched, index, base_name).await {
                Ok(packaged) => Some(packaged),
                Err(e) => {
                    self.fail_batch(index, &e).await?;
                    return Err(e);
                }
            }
        };

        let artifact = {
            let mut state = self.state.write().await;
            let batch = state.batch_mut(index)?;
            batch.completed_count = succeeded;
            batch.failed_count = failed;
            batch.progress = 100.0;
            batch.status = Status::Completed;
            batch.end_time = Some(now_ms());

            let artifact = packaged.map(|p| CompletedArtifact {
                filename: p.filename,
                batch_index: index,
                item_count: succeeded,
                handle: p.handle,
                created_at: now_ms(),
            });
            if let Some(artifact) = &artifact {
                state.overall.completed_artifacts.push(artifact.clone());
            }
            state.overall.failed_articles += failed;
            state.refresh_progress();
            artifact
        };

        if let Some(artifact) = artifact {
            tracing::info!(
                batch_index = index,
                filename = %artifact.filename,
                handle = %artifact.handle,
                "Batch artifact created"
            );
            self.emit(Event::ArtifactCreated { artifact });
        } else {
            tracing::warn!(
                batch_id = %batch_id,
                batch_index = index,
                "Batch fetched no items, no artifact created"
            );
        }

        tracing::info!(
            batch_id = %batch_id,
            batch_index = index,
            succeeded,
            failed,
            "Batch completed"
        );
        self.emit(Event::BatchCompleted {
            batch_index: index,
            succeeded,
            failed,
        });

        Ok(())
    }

    /// Record a progress report from the fetcher.
    async fn apply_progress(&self, index: usize, done: usize, total: usize) -> Result<()> {
        let overall_percent = {
            let mut state = self.state.write().await;
            let batch = state.batch_mut(index)?;
            batch.completed_count = done.min(total);
            batch.progress = if total > 0 {
                batch.completed_count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            state.refresh_progress();
            state.overall.overall_progress
        };

        tracing::debug!(batch_index = index, completed = done, total, "Batch progress");
        self.emit(Event::BatchProgress {
            batch_index: index,
            completed: done.min(total),
            total,
            overall_percent,
        });
        Ok(())
    }

    /// Mark the current attempt of a batch as failed.
    async fn fail_batch(&self, index: usize, err: &Error) -> Result<()> {
        let mut state = self.state.write().await;
        let batch = state.batch_mut(index)?;
        batch.status = Status::Failed;
        batch.error = Some(err.to_string());
        batch.end_time = Some(now_ms());
        tracing::warn!(batch_id = %batch.id, batch_index = index, error = %err, "Batch attempt failed");
        state.refresh_progress();
        Ok(())
    }
}
