//! Run lifecycle: start, the sequential batch loop and run finalization.

use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use crate::config::{BatchConfig, ConfigOverrides};
use crate::error::{Error, Result};
use crate::planner::plan_batches;
use crate::retry::sleep_or_cancel;
use crate::sizer::{SizingSample, adjust_batch_size};
use crate::types::{ArtifactHandle, Event, OverallState, Status, WorkItem, now_ms};

use super::BatchRunner;
use super::retry::BatchAttempt;

/// Consecutive exhausted batches after which the run pauses itself
pub(crate) const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// How a batch ended after all of its attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Completed,
    Exhausted,
    Cancelled,
}

impl BatchRunner {
    /// Start a run over `items` and drive it to its end.
    ///
    /// `overrides` are merged over the runner's base config. Artifacts are named
    /// `{base_name}_batch_{n}` with `n` starting at 1. Artifacts of the previous run are released
    /// before the new run is planned.
    ///
    /// Returns `Ok(())` when the run completed or was cancelled, `Err(Error::NoSuccessfulItems)`
    /// when it produced no artifact, and `Err(Error::ConcurrentRun)` when another run is active.
    /// A run that was just cancelled is allowed to finish its current batch before this one plans.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use autobatch::*;
    /// # async fn example(runner: BatchRunner, items: Vec<WorkItem>) -> Result<()> {
    /// runner
    ///     .start(items, "weekly-digest", ConfigOverrides::default())
    ///     .await?;
    /// let state = runner.overall_state().await;
    /// println!("{} artifacts", state.completed_artifacts.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(
        &self,
        items: Vec<WorkItem>,
        base_name: &str,
        overrides: ConfigOverrides,
    ) -> Result<()> {
        let config = self.base_config.with_overrides(&overrides);
        config.validate()?;

        if self
            .flags
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ConcurrentRun);
        }

        let token = CancellationToken::new();
        *self.flags.cancel_token.lock().await = token.clone();
        self.flags.paused.store(false, Ordering::SeqCst);

        // Wait for a cancelled loop to finish its current batch
        let _guard = self.flags.run_guard.lock().await;

        self.run(items, base_name, config, token).await
    }

    async fn run(
        &self,
        items: Vec<WorkItem>,
        base_name: &str,
        config: BatchConfig,
        token: CancellationToken,
    ) -> Result<()> {
        let stale = self.install_run(items, config).await;
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "Releasing artifacts of the previous run");
            self.release_handles(stale).await;
        }

        let outcome = self.run_batches(base_name, &token).await;
        self.finish_run(&token, outcome).await
    }

    /// Plan the batches and reset the session state. Returns the previous run's artifact handles.
    async fn install_run(&self, items: Vec<WorkItem>, config: BatchConfig) -> Vec<ArtifactHandle> {
        let batch_size = config.batch_size;
        let batches = plan_batches(&items, batch_size, now_ms());
        let total_items = items.len();
        let total_batches = batches.len();

        let stale = {
            let mut state = self.state.write().await;
            let previous = std::mem::take(&mut state.overall.completed_artifacts);
            state.batches = batches;
            state.config = config;
            state.overall = OverallState {
                status: Status::Running,
                total_articles: total_items,
                total_batches,
                ..Default::default()
            };
            previous.into_iter().map(|a| a.handle).collect()
        };

        tracing::info!(total_items, total_batches, batch_size, "Batch run started");
        self.emit(Event::RunStarted {
            total_items,
            total_batches,
            batch_size,
        });

        stale
    }

    async fn run_batches(&self, base_name: &str, token: &CancellationToken) -> Result<()> {
        let total = self.state.read().await.batches.len();
        let mut consecutive_failures = 0usize;

        for index in 0..total {
            if token.is_cancelled() || !self.wait_while_paused(token).await {
                break;
            }

            match self.process_batch(index, base_name, token).await? {
                BatchOutcome::Completed => {
                    consecutive_failures = 0;
                    self.adapt_batch_size(index).await;
                }
                BatchOutcome::Exhausted => {
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES && index + 1 < total {
                        self.auto_pause(consecutive_failures).await;
                        consecutive_failures = 0;
                    }
                }
                BatchOutcome::Cancelled => break,
            }

            if index + 1 < total {
                let delay = self.state.read().await.config.download_delay;
                if !sleep_or_cancel(delay, token).await {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Execute a batch and retry it until it completes, runs out of retries, or the run is cancelled.
    async fn process_batch(
        &self,
        index: usize,
        base_name: &str,
        token: &CancellationToken,
    ) -> Result<BatchOutcome> {
        let mut last_error = match self.execute_batch(index, base_name).await {
            Ok(()) => return Ok(BatchOutcome::Completed),
            Err(e) => e,
        };

        loop {
            match self.retry_batch(index, base_name, token, &last_error).await {
                Ok(BatchAttempt::Succeeded) => return Ok(BatchOutcome::Completed),
                Ok(BatchAttempt::Failed(e)) => last_error = e,
                Ok(BatchAttempt::Cancelled) => return Ok(BatchOutcome::Cancelled),
                Err(exhausted @ Error::RetryExhausted { .. }) => {
                    self.mark_exhausted(index, &exhausted).await?;
                    return Ok(BatchOutcome::Exhausted);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Block while the run is paused. Returns `false` if the run was cancelled meanwhile.
    async fn wait_while_paused(&self, token: &CancellationToken) -> bool {
        while self.flags.paused.load(Ordering::SeqCst) {
            let poll = self.state.read().await.config.pause_poll_interval;
            if !sleep_or_cancel(poll, token).await {
                return false;
            }
        }
        !token.is_cancelled()
    }

    async fn auto_pause(&self, consecutive_failures: usize) {
        self.flags.paused.store(true, Ordering::SeqCst);
        self.state.write().await.overall.status = Status::Paused;

        tracing::warn!(
            consecutive_failures,
            "Too many consecutive batch failures, pausing run"
        );
        self.emit(Event::Paused { automatic: true });
    }

    /// Revise the live batch size from the batches attempted up to `index`.
    async fn adapt_batch_size(&self, index: usize) {
        let change = {
            let mut state = self.state.write().await;
            let attempted = (index + 1).min(state.batches.len());
            let Some(sample) = SizingSample::from_attempted(&state.batches[..attempted]) else {
                return;
            };

            let from = state.config.batch_size;
            let to = adjust_batch_size(&state.config, sample.success_rate, sample.avg_duration_ms);
            if to == from {
                return;
            }
            state.config.batch_size = to;
            state.refresh_progress();
            (from, to, sample.success_rate)
        };

        let (from, to, success_rate) = change;
        tracing::info!(from, to, success_rate, "Adjusted batch size");
        self.emit(Event::BatchSizeAdjusted {
            from,
            to,
            success_rate,
        });
    }

    /// Settle the terminal status of the run.
    async fn finish_run(&self, token: &CancellationToken, outcome: Result<()>) -> Result<()> {
        let cancelled = token.is_cancelled();

        let result = {
            let mut state = self.state.write().await;
            state.refresh_progress();

            if cancelled {
                state.overall.status = Status::Cancelled;
                Ok(())
            } else if let Err(e) = outcome {
                state.overall.status = Status::Failed;
                Err(e)
            } else if state.overall.completed_artifacts.is_empty() {
                state.overall.status = Status::Failed;
                Err(Error::NoSuccessfulItems)
            } else {
                state.overall.status = Status::Completed;
                let artifacts = state.overall.completed_artifacts.len();
                let items = state
                    .overall
                    .completed_artifacts
                    .iter()
                    .map(|a| a.item_count)
                    .sum();
                tracing::info!(
                    artifacts,
                    items,
                    failed_articles = state.overall.failed_articles,
                    "Batch run completed"
                );
                self.emit(Event::RunCompleted { artifacts, items });
                Ok(())
            }
        };

        match &result {
            Err(e) => {
                tracing::error!(error = %e, "Batch run failed");
                self.emit(Event::RunFailed {
                    error: e.to_string(),
                });
            }
            Ok(()) if cancelled => tracing::info!("Batch run cancelled"),
            Ok(()) => {}
        }

        // A cancelled run already handed its flags to `cancel` (and maybe a newer run)
        let current = self.flags.cancel_token.lock().await;
        if !token.is_cancelled() {
            self.flags.running.store(false, Ordering::SeqCst);
            self.flags.paused.store(false, Ordering::SeqCst);
        }
        drop(current);

        result
    }
}
