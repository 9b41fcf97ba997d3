//! Bounded re-attempts of a failed batch.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::retry::{IsRetryable, sleep_or_cancel};
use crate::types::{Event, Status, now_ms};

use super::BatchRunner;

/// Outcome of one retry
pub(crate) enum BatchAttempt {
    /// The re-executed batch completed
    Succeeded,
    /// The re-executed batch failed again
    Failed(Error),
    /// The run was cancelled during the retry delay
    Cancelled,
}

impl BatchRunner {
    /// Retry the failed batch at `index` once.
    ///
    /// Returns `Err(Error::RetryExhausted)` when the batch already used `max_retries` retries or
    /// `last_error` is a run-state error. Otherwise the retry counter is bumped, per-attempt state
    /// is reset, and the batch is re-executed after `retry_delay`. A cancellation during the delay
    /// puts the batch back to `Failed` with `last_error`.
    pub(crate) async fn retry_batch(
        &self,
        index: usize,
        base_name: &str,
        token: &CancellationToken,
        last_error: &Error,
    ) -> Result<BatchAttempt> {
        let (attempt, delay) = {
            let mut state = self.state.write().await;
            let max_retries = state.config.max_retries;
            let delay = state.config.retry_delay;
            let batch = state.batch_mut(index)?;

            if batch.retry_count >= max_retries || !last_error.is_retryable() {
                return Err(Error::RetryExhausted {
                    batch_id: batch.id.clone(),
                    retries: batch.retry_count,
                    last_error: last_error.to_string(),
                });
            }

            batch.retry_count += 1;
            batch.reset_for_retry();
            (batch.retry_count, delay)
        };

        tracing::warn!(
            batch_index = index,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "Retrying batch"
        );
        self.emit(Event::BatchRetrying {
            batch_index: index,
            attempt,
            delay_ms: delay.as_millis() as u64,
        });

        if !sleep_or_cancel(delay, token).await {
            self.restore_failed(index, last_error).await?;
            return Ok(BatchAttempt::Cancelled);
        }

        match self.execute_batch(index, base_name).await {
            Ok(()) => Ok(BatchAttempt::Succeeded),
            Err(e) => Ok(BatchAttempt::Failed(e)),
        }
    }

    /// Undo a retry that never ran because the run was cancelled during its delay.
    ///
    /// The batch returns to `Failed` with its last error, gives the unused retry back, and its
    /// items count as failed articles.
    async fn restore_failed(&self, index: usize, last_error: &Error) -> Result<()> {
        let mut state = self.state.write().await;
        let batch = state.batch_mut(index)?;
        batch.retry_count = batch.retry_count.saturating_sub(1);
        batch.status = Status::Failed;
        batch.error = Some(last_error.to_string());
        batch.failed_count = batch.items.len();
        batch.completed_count = 0;
        batch.end_time = Some(now_ms());
        let item_count = batch.items.len();
        state.overall.failed_articles += item_count;
        state.refresh_progress();

        tracing::info!(batch_index = index, error = %last_error, "Retry abandoned on cancellation");
        Ok(())
    }

    /// Record a batch that ran out of retries.
    ///
    /// The batch stays `Failed` and all of its items count as failed articles, exactly once.
    pub(crate) async fn mark_exhausted(&self, index: usize, exhausted: &Error) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let batch = state.batch_mut(index)?;
            batch.status = Status::Failed;
            batch.error = Some(exhausted.to_string());
            batch.failed_count = batch.items.len();
            batch.completed_count = 0;
            if batch.end_time.is_none() {
                batch.end_time = Some(now_ms());
            }
            let item_count = batch.items.len();
            state.overall.failed_articles += item_count;
            state.refresh_progress();
        }

        tracing::error!(batch_index = index, error = %exhausted, "Batch failed permanently");
        self.emit(Event::BatchFailed {
            batch_index: index,
            error: exhausted.to_string(),
        });
        Ok(())
    }
}
