//! Adaptive batch sizing from observed success rate and latency.
//!
//! The revised size is advisory: it is written to the run's live config and shows up in
//! statistics and progress accounting, but batches planned at start keep their size.

use crate::config::BatchConfig;
use crate::types::{Batch, Status};

/// Completed batches required before sizing kicks in
pub const MIN_SAMPLE_BATCHES: usize = 3;

/// Factor applied when the success rate falls below the threshold
const SHRINK_FACTOR: f64 = 0.7;

/// Factor applied when batches are both reliable and fast
const GROW_FACTOR: f64 = 1.3;

/// Success rate above which growing is considered
const HIGH_SUCCESS_RATE: f64 = 0.95;

/// Average batch duration (ms) below which growing is considered
const FAST_BATCH_MS: f64 = 10_000.0;

/// Observed outcome of the batches attempted so far
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizingSample {
    /// Completed batches divided by attempted batches (0.0 to 1.0)
    pub success_rate: f64,
    /// Mean wall-clock duration of the completed batches in milliseconds
    pub avg_duration_ms: f64,
}

impl SizingSample {
    /// Build a sample from the attempted prefix of the batch list.
    ///
    /// Returns `None` until at least [`MIN_SAMPLE_BATCHES`] of them have completed.
    pub fn from_attempted(attempted: &[Batch]) -> Option<Self> {
        let completed: Vec<&Batch> = attempted
            .iter()
            .filter(|b| b.status == Status::Completed)
            .collect();
        if completed.len() < MIN_SAMPLE_BATCHES {
            return None;
        }

        let total_ms: i64 = completed.iter().filter_map(|b| b.duration_ms()).sum();
        Some(Self {
            success_rate: completed.len() as f64 / attempted.len() as f64,
            avg_duration_ms: total_ms as f64 / completed.len() as f64,
        })
    }
}

/// Compute the next batch size.
///
/// Returns `config.batch_size` untouched when adaptive sizing is disabled. Otherwise the result
/// always lies within `[min_batch_size, max_batch_size]`.
pub fn adjust_batch_size(config: &BatchConfig, success_rate: f64, avg_duration_ms: f64) -> usize {
    let current = config.batch_size;
    if !config.auto_adjust_batch_size {
        return current;
    }

    let next = if success_rate < config.success_rate_threshold {
        ((current as f64 * SHRINK_FACTOR).floor() as usize).max(config.min_batch_size)
    } else if success_rate > HIGH_SUCCESS_RATE && avg_duration_ms < FAST_BATCH_MS {
        ((current as f64 * GROW_FACTOR).floor() as usize).min(config.max_batch_size)
    } else {
        current
    };

    next.clamp(config.min_batch_size, config.max_batch_size)
}
