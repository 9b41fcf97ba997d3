//! Batch planning: split an ordered item list into fixed-size batches.

use crate::types::{Batch, WorkItem};

/// Number of batches needed for `item_count` items at `batch_size` (0 is treated as 1).
pub fn batch_count(item_count: usize, batch_size: usize) -> usize {
    item_count.div_ceil(batch_size.max(1))
}

/// Partition `items` into consecutive batches of `batch_size`.
///
/// Batch `k` holds items `[k * batch_size, min((k + 1) * batch_size, len))`; only the last batch
/// may be shorter. Ids are `batch_{run_started_ms}_{offset of the first item}`.
pub fn plan_batches(items: &[WorkItem], batch_size: usize, run_started_ms: i64) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    items
        .chunks(batch_size)
        .enumerate()
        .map(|(k, chunk)| {
            Batch::new(
                format!("batch_{}_{}", run_started_ms, k * batch_size),
                chunk.to_vec(),
            )
        })
        .collect()
}
