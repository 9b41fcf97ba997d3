//! Run control: pause, resume, cancel, retry of failed items, state teardown.

use std::sync::atomic::Ordering;

use crate::config::ConfigOverrides;
use crate::error::{Error, Result};
use crate::types::{Event, Status, WorkItem};

use super::BatchRunner;

impl BatchRunner {
    /// Pause the active run
    ///
    /// The batch in flight finishes; the run then waits before starting the next batch until
    /// [`resume`](Self::resume) or [`cancel`](Self::cancel) is called. Pausing a paused run is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRun`] when no run is active.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use autobatch::*;
    /// # async fn example(runner: BatchRunner) -> Result<()> {
    /// runner.pause().await?;
    /// assert!(runner.is_paused());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn pause(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::no_active_run("pause"));
        }

        self.flags.paused.store(true, Ordering::SeqCst);
        self.state.write().await.overall.status = Status::Paused;

        tracing::info!("Batch run paused");
        self.emit(Event::Paused { automatic: false });
        Ok(())
    }

    /// Resume a paused run
    ///
    /// Processing continues with the next batch; batches that already completed are not
    /// fetched again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRun`] unless a run is active and paused.
    pub async fn resume(&self) -> Result<()> {
        if !self.is_running() || !self.is_paused() {
            return Err(Error::no_active_run("resume"));
        }

        self.flags.paused.store(false, Ordering::SeqCst);
        self.state.write().await.overall.status = Status::Running;

        tracing::info!("Batch run resumed");
        self.emit(Event::Resumed);
        Ok(())
    }

    /// Cancel the active run
    ///
    /// No further batch is started. A batch whose fetch is in flight still packages its results;
    /// sleeps (retry delay, inter-batch delay, pause wait) end immediately. The run's status
    /// becomes `Cancelled` and [`start`](Self::start) returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRun`] when no run is active.
    pub async fn cancel(&self) -> Result<()> {
        {
            let token = self.flags.cancel_token.lock().await;
            if !self.is_running() {
                return Err(Error::no_active_run("cancel"));
            }
            token.cancel();
            self.flags.running.store(false, Ordering::SeqCst);
            self.flags.paused.store(false, Ordering::SeqCst);
        }

        self.state.write().await.overall.status = Status::Cancelled;

        tracing::info!("Batch run cancellation requested");
        self.emit(Event::Cancelled);
        Ok(())
    }

    /// Drop all batches and artifacts of the last run
    ///
    /// Every artifact handle is released through the packager exactly once and the aggregate is
    /// reset. The live config is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentRun`] while a run is active or a cancelled run is still
    /// finishing its current batch.
    pub async fn clear_state(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::ConcurrentRun);
        }
        let _guard = self
            .flags
            .run_guard
            .try_lock()
            .map_err(|_| Error::ConcurrentRun)?;

        let handles: Vec<_> = {
            let mut state = self.state.write().await;
            state.batches.clear();
            let overall = std::mem::take(&mut state.overall);
            overall
                .completed_artifacts
                .into_iter()
                .map(|a| a.handle)
                .collect()
        };

        let released = handles.len();
        self.release_handles(handles).await;

        tracing::info!(released, "Batch state cleared");
        self.emit(Event::StateCleared);
        Ok(())
    }

    /// Items of every batch that ended `Failed`, in batch order
    pub async fn failed_items(&self) -> Vec<WorkItem> {
        self.state
            .read()
            .await
            .batches
            .iter()
            .filter(|b| b.status == Status::Failed)
            .flat_map(|b| b.items.iter().cloned())
            .collect()
    }

    /// Start a new run over the items of all failed batches
    ///
    /// The new run uses the runner's base config and names its artifacts
    /// `{base_name}_retry_batch_{n}`. It replaces the current session state, so artifacts of the
    /// previous run are released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentRun`] while a run is active, [`Error::NothingToRetry`] when no
    /// batch failed, and otherwise whatever [`start`](Self::start) returns.
    pub async fn retry_failed(&self, base_name: &str) -> Result<()> {
        if self.is_running() {
            return Err(Error::ConcurrentRun);
        }

        let items = self.failed_items().await;
        if items.is_empty() {
            return Err(Error::NothingToRetry);
        }

        tracing::info!(items = items.len(), "Retrying failed items");
        self.start(
            items,
            &format!("{}_retry", base_name),
            ConfigOverrides::default(),
        )
        .await
    }
}
