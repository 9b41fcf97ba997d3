//! Batch run controller split into focused submodules.
//!
//! The `BatchRunner` struct and its methods are organized by concern:
//! - [`run_loop`] - `start`, the sequential batch loop and run finalization
//! - [`executor`] - one batch end to end: fetch, drain progress, package, record artifact
//! - [`retry`] - bounded re-attempts of a failed batch
//! - [`control`] - pause, resume, cancel, retry of failed items, state teardown
//! - [`oneshot`] - pack a whole item list into a single archive

mod control;
mod executor;
mod oneshot;
mod retry;
mod run_loop;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::collab::{ItemFetcher, Packager};
use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::types::{ArtifactHandle, Batch, BatchStats, Event, OverallState};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Session state of the current (or last) run
///
/// Batches, the aggregate and the live config sit behind one lock so every snapshot a reader
/// takes is internally consistent.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    /// Batches planned at start
    pub(crate) batches: Vec<Batch>,
    /// Run-level aggregate including the artifact list
    pub(crate) overall: OverallState,
    /// Merged config of the run; `batch_size` is revised by adaptive sizing
    pub(crate) config: BatchConfig,
}

impl RunState {
    pub(crate) fn batch_mut(&mut self, index: usize) -> Result<&mut Batch> {
        self.batches
            .get_mut(index)
            .ok_or_else(|| Error::Other(format!("batch index {} out of range", index)))
    }

    /// Recompute the aggregate from the batch list.
    pub(crate) fn refresh_progress(&mut self) {
        crate::progress::refresh(
            &mut self.overall,
            &self.batches,
            self.config.batch_size,
            crate::types::now_ms(),
        );
    }
}

/// Flags and signals shared between the run loop and the control operations
#[derive(Clone)]
pub(crate) struct RunFlags {
    /// A run is active (cleared by `cancel` and when the loop finishes)
    pub(crate) running: Arc<AtomicBool>,
    /// The active run is paused
    pub(crate) paused: Arc<AtomicBool>,
    /// Cancellation token of the current run (replaced by every `start`)
    pub(crate) cancel_token: Arc<Mutex<CancellationToken>>,
    /// Held by the run loop for its whole lifetime; a cancelled loop keeps it until it unwinds
    pub(crate) run_guard: Arc<Mutex<()>>,
}

impl RunFlags {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            cancel_token: Arc::new(Mutex::new(CancellationToken::new())),
            run_guard: Arc::new(Mutex::new(())),
        }
    }
}

/// Adaptive batch runner (cloneable - all fields are Arc-wrapped)
///
/// Splits an ordered item list into batches and processes them strictly one after another:
/// fetch through the [`ItemFetcher`], package through the [`Packager`], retry failed batches,
/// and expose progress, pause/resume and cancellation. Only one run may be active at a time.
#[derive(Clone)]
pub struct BatchRunner {
    /// Base configuration every run's overrides are merged onto
    pub(crate) base_config: Arc<BatchConfig>,
    /// Fetch collaborator
    pub(crate) fetcher: Arc<dyn ItemFetcher>,
    /// Packaging collaborator
    pub(crate) packager: Arc<dyn Packager>,
    /// Session state of the current run
    pub(crate) state: Arc<RwLock<RunState>>,
    /// Run/pause flags and cancellation
    pub(crate) flags: RunFlags,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl BatchRunner {
    /// Create a runner with `config` as the base for every run.
    pub fn new(
        config: BatchConfig,
        fetcher: Arc<dyn ItemFetcher>,
        packager: Arc<dyn Packager>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            state: Arc::new(RwLock::new(RunState {
                config: config.clone(),
                ..Default::default()
            })),
            base_config: Arc::new(config),
            fetcher,
            packager,
            flags: RunFlags::new(),
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether a run is active
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    /// Whether the active run is paused
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Snapshot of the run-level aggregate
    pub async fn overall_state(&self) -> OverallState {
        self.state.read().await.overall.clone()
    }

    /// Snapshot of the batch list
    pub async fn batches(&self) -> Vec<Batch> {
        self.state.read().await.batches.clone()
    }

    /// Derived batch statistics
    pub async fn stats(&self) -> BatchStats {
        let state = self.state.read().await;
        BatchStats::from_batches(&state.batches, state.config.batch_size)
    }

    /// Live configuration of the current (or last) run
    pub async fn current_config(&self) -> BatchConfig {
        self.state.read().await.config.clone()
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Release each handle through the packager.
    pub(crate) async fn release_handles(&self, handles: impl IntoIterator<Item = ArtifactHandle>) {
        for handle in handles {
            self.packager.release(&handle).await;
        }
    }
}
