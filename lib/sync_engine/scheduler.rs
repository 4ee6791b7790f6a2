use std::collections::BTreeSet;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::pak_index::SegmentId;

use super::error::Error;
use super::types::{BatchError, SchedulerOutcome};

/// Processes one batch end to end (fetch, post-process, cleanup).
///
/// This trait exists so scheduling behavior can be unit-tested against
/// scripted batch outcomes without any network or subprocess work.
pub trait BatchProcessor: Send + Sync {
    fn process_batch<'a>(
        &'a self,
        batch: &'a [SegmentId],
    ) -> BoxFuture<'a, Result<(), BatchError>>;
}

/// Drives pending batches strictly sequentially, checkpointing after each.
///
/// A later batch never starts before the former is durably recorded, so an
/// interruption at any point resumes at the next unprocessed batch. A failed
/// batch contributes nothing, even if some of its segments were individually
/// fetched.
pub struct BatchScheduler<'a> {
    store: &'a CheckpointStore,
    batch_size: usize,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(store: &'a CheckpointStore, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    pub async fn run<P>(
        &self,
        required: &BTreeSet<SegmentId>,
        processed: &BTreeSet<SegmentId>,
        processor: &P,
    ) -> Result<SchedulerOutcome, Error>
    where
        P: BatchProcessor,
    {
        let pending: Vec<SegmentId> = required.difference(processed).copied().collect();
        if pending.is_empty() {
            // Steady-state "nothing to do"; must stay cheap.
            return Ok(SchedulerOutcome::Completed {
                batches: 0,
                segments: 0,
            });
        }

        let batch_size = self.batch_size.max(1);
        let total_batches = pending.len().div_ceil(batch_size);

        for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
            info!(
                event = "batch_started",
                batch_index,
                total_batches,
                segments = batch.len(),
                first_segment = batch[0],
                "processing segment batch"
            );

            match processor.process_batch(batch).await {
                Ok(()) => {
                    // Durable before the next batch starts; a crash here loses
                    // nothing.
                    let state = self.store.record_processed(batch)?;
                    info!(
                        event = "batch_checkpointed",
                        batch_index,
                        processed_total = state.processed.len(),
                        "recorded batch completion"
                    );
                }
                Err(cause) => {
                    warn!(
                        event = "batch_failed",
                        batch_index,
                        error = %cause,
                        "batch failed; stopping at last checkpoint"
                    );
                    return Ok(SchedulerOutcome::Partial {
                        completed_batches: batch_index,
                        failed_batch: batch.to_vec(),
                        cause,
                    });
                }
            }
        }

        Ok(SchedulerOutcome::Completed {
            batches: total_batches,
            segments: pending.len(),
        })
    }
}
