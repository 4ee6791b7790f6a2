use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::{info, warn};

use crate::distribution::{ChannelCatalog, DistributionClient, DistributionError};
use crate::pak_index::SegmentId;

use super::cleanup;
use super::postprocess::PostProcessor;
use super::scheduler::BatchProcessor;
use super::types::{BatchError, MissingSegmentPolicy, SegmentFetchOutcome, SyncEngineConfig};

/// Conventional file name of one archive segment: the stem plus the id
/// zero-padded to three digits, e.g. `pak01_007.vpk`.
pub fn segment_file_name(stem: &str, segment: SegmentId) -> String {
    format!("{stem}_{segment:03}.vpk")
}

/// Per-batch fetch → post-process → cleanup pipeline.
///
/// Fetches within a batch are independent and run concurrently up to the
/// configured parallelism; the post-process step starts only after every
/// fetch has settled (success or not-found). Staging paths are keyed by file
/// name alone, so a retried batch safely overwrites partial prior attempts.
pub struct BatchPipeline<C> {
    client: C,
    /// Channel catalogs in priority order; the first catalog listing a
    /// segment's file wins.
    catalogs: Vec<ChannelCatalog>,
    staging_dir: PathBuf,
    archive_stem: String,
    fetch_parallelism: usize,
    missing_policy: MissingSegmentPolicy,
    post_processor: Option<Arc<dyn PostProcessor>>,
    transient_output: Option<PathBuf>,
}

impl<C> BatchPipeline<C>
where
    C: DistributionClient,
{
    pub fn new(
        client: C,
        catalogs: Vec<ChannelCatalog>,
        config: &SyncEngineConfig,
        post_processor: Option<Arc<dyn PostProcessor>>,
    ) -> Self {
        Self {
            client,
            catalogs,
            staging_dir: config.staging_dir.clone(),
            archive_stem: config.archive_stem.clone(),
            fetch_parallelism: config.fetch_parallelism,
            missing_policy: config.missing_segment_policy,
            post_processor,
            transient_output: config.transient_output.clone(),
        }
    }

    async fn fetch_segment(
        &self,
        segment: SegmentId,
    ) -> Result<SegmentFetchOutcome, DistributionError> {
        let file_name = segment_file_name(&self.archive_stem, segment);

        for catalog in &self.catalogs {
            let Some(file) = catalog.find_by_suffix(&file_name) else {
                continue;
            };

            let dest = self.staging_dir.join(&file_name);
            self.client.fetch_file(catalog.channel, file, &dest).await?;
            return Ok(SegmentFetchOutcome::Fetched {
                segment,
                channel: catalog.channel,
                path: dest,
            });
        }

        Ok(SegmentFetchOutcome::NotFound { segment })
    }
}

impl<C> BatchProcessor for BatchPipeline<C>
where
    C: DistributionClient,
{
    fn process_batch<'a>(
        &'a self,
        batch: &'a [SegmentId],
    ) -> BoxFuture<'a, Result<(), BatchError>> {
        Box::pin(async move {
            let total = batch.len();
            let settled = AtomicUsize::new(0);

            // Owned ids keep the closure's input independent of the batch
            // borrow; the futures themselves still borrow `self` and the
            // settled counter.
            let outcomes: Vec<Result<SegmentFetchOutcome, DistributionError>> =
                futures::stream::iter(batch.to_vec())
                    .map(|segment| {
                        let settled = &settled;
                        async move {
                            let outcome = self.fetch_segment(segment).await;
                            let done = settled.fetch_add(1, Ordering::Relaxed) + 1;
                            if let Ok(SegmentFetchOutcome::Fetched { channel, .. }) = &outcome {
                                info!(
                                    event = "segment_fetched",
                                    segment,
                                    channel = *channel,
                                    fetched = done,
                                    total,
                                    "downloaded archive segment"
                                );
                            }
                            outcome
                        }
                    })
                    .buffer_unordered(self.fetch_parallelism.max(1))
                    .collect()
                    .await;

            // All fetches have settled; now decide whether the batch proceeds.
            let mut staged = Vec::with_capacity(total);
            for outcome in outcomes {
                match outcome? {
                    SegmentFetchOutcome::Fetched { path, .. } => staged.push(path),
                    SegmentFetchOutcome::NotFound { segment } => match self.missing_policy {
                        MissingSegmentPolicy::SkipAndLog => {
                            warn!(
                                event = "segment_not_found",
                                segment,
                                file_name = segment_file_name(&self.archive_stem, segment),
                                "segment absent from every channel; skipping"
                            );
                        }
                        MissingSegmentPolicy::FailBatch => {
                            return Err(BatchError::MissingSegment { segment });
                        }
                    },
                }
            }

            if let Some(post_processor) = &self.post_processor {
                post_processor.process(batch, &self.staging_dir).await?;
            }

            cleanup::sweep_staged_files(&staged).await;
            if let Some(output_dir) = &self.transient_output {
                cleanup::sweep_transient_output(output_dir).await;
            }

            Ok(())
        })
    }
}
