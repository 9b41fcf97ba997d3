//! Run-level progress aggregation.
//!
//! `completed_articles` counts every completed batch as `current_batch_size` items plus the
//! running batch's fetched items. This is exact only while the batch size has not been revised
//! by adaptive sizing; the count is capped at the run's total.

use crate::types::{Batch, OverallState, Status};

/// Recompute the derived fields of `overall` from the batch list.
pub fn refresh(overall: &mut OverallState, batches: &[Batch], current_batch_size: usize, now_ms: i64) {
    let completed: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.status == Status::Completed)
        .collect();
    let running_done = batches
        .iter()
        .find(|b| b.status == Status::Running)
        .map_or(0, |b| b.completed_count);

    let estimated = completed.len() * current_batch_size + running_done;
    overall.completed_articles = estimated.min(overall.total_articles);
    overall.current_batch_index = completed.len();
    overall.overall_progress = if overall.total_articles > 0 {
        overall.completed_articles as f64 / overall.total_articles as f64 * 100.0
    } else {
        0.0
    };

    let durations: Vec<i64> = completed.iter().filter_map(|b| b.duration_ms()).collect();
    overall.estimated_time_remaining = if durations.is_empty() {
        None
    } else {
        let avg = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
        let remaining = overall.total_batches.saturating_sub(completed.len());
        Some((remaining as f64 * avg) as u64)
    };

    overall.download_speed = batches
        .first()
        .and_then(|b| b.start_time)
        .map(|first_start| now_ms - first_start)
        .filter(|elapsed| *elapsed > 0)
        .map(|elapsed| overall.completed_articles as f64 / elapsed as f64 * 60_000.0);
}
