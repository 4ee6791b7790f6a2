use std::sync::Arc;

use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::distribution::{
    ChannelCatalog, ChannelId, DistributionClient, FileRef, ProductSnapshot, VersionId,
};
use crate::pak_index::DirectoryIndex;

use super::error::Error;
use super::pipeline::BatchPipeline;
use super::postprocess::PostProcessor;
use super::scheduler::BatchScheduler;
use super::selector::select_segments;
use super::types::{BatchError, SchedulerOutcome, SyncEngineConfig};

/// Terminal outcome of one sync invocation.
///
/// `Partial` is not an internal retry loop: the engine is designed to be
/// safely re-entrant, so the caller re-invokes it later and the run resumes
/// at the next pending batch.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Remote version matches the last committed one and nothing is pending.
    Unchanged { version: VersionId },
    Completed {
        version: VersionId,
        batches: usize,
        segments: usize,
    },
    Partial {
        version: VersionId,
        completed_batches: usize,
        cause: BatchError,
    },
}

impl SyncOutcome {
    /// True when the invocation left nothing pending.
    pub fn is_fully_synced(&self) -> bool {
        matches!(self, SyncOutcome::Unchanged { .. } | SyncOutcome::Completed { .. })
    }
}

/// Top-level sync orchestration.
///
/// Drives `CHECK_VERSION → SELECTING → SCHEDULING` and commits the version
/// marker only once the full required set is confirmed processed. All run
/// parameters arrive through [`SyncEngineConfig`]; nothing is read from
/// ambient globals mid-run.
pub struct SyncController<C> {
    client: C,
    store: CheckpointStore,
    config: SyncEngineConfig,
    post_processor: Option<Arc<dyn PostProcessor>>,
}

impl<C> SyncController<C>
where
    C: DistributionClient + Clone,
{
    pub fn new(
        client: C,
        store: CheckpointStore,
        config: SyncEngineConfig,
        post_processor: Option<Arc<dyn PostProcessor>>,
    ) -> Self {
        Self {
            client,
            store,
            config,
            post_processor,
        }
    }

    /// Runs one sync pass.
    ///
    /// Steps:
    /// 1. Resolve the current remote version and compare to checkpoint state.
    /// 2. Reset checkpoint progress when the version changed.
    /// 3. Fetch and parse the directory index, select required segments.
    /// 4. Delegate pending batches to the scheduler.
    /// 5. Commit the version marker only on full completion.
    pub async fn run(&self) -> Result<SyncOutcome, Error> {
        validate_config(&self.config)?;

        std::fs::create_dir_all(&self.config.staging_dir).map_err(|source| Error::StagingIo {
            path: self.config.staging_dir.clone(),
            source,
        })?;

        let snapshot = self.client.product_snapshot(self.config.product_id).await?;
        let version = snapshot.version.clone();

        let state = self.store.load()?;
        let resuming = state.has_progress_for(&version);

        if state.is_committed(&version) && !resuming {
            info!(
                event = "version_unchanged",
                version = %version,
                "remote version already committed; nothing to do"
            );
            return Ok(SyncOutcome::Unchanged { version });
        }

        if resuming {
            info!(
                event = "resuming_interrupted_run",
                version = %version,
                processed = state.processed.len(),
                "resuming prior progress for the same version"
            );
        } else {
            // A version change invalidates all prior progress before any new
            // batch runs.
            self.store.reset_for_new_version(&version)?;
            info!(
                event = "checkpoint_reset",
                version = %version,
                previous_committed = ?state.last_committed_version,
                "new remote version; cleared processed set"
            );
        }

        let catalogs = order_catalogs(&snapshot, &self.config.channels);
        let index = self.load_directory_index(&catalogs).await?;
        let required = select_segments(&index, &self.config.path_filters);
        let state = self.store.record_required(&required)?;

        info!(
            event = "selection_complete",
            version = %version,
            index_entries = index.len(),
            required = required.len(),
            already_processed = state.processed.len(),
            "resolved required segment set"
        );

        let pipeline = BatchPipeline::new(
            self.client.clone(),
            catalogs,
            &self.config,
            self.post_processor.clone(),
        );
        let scheduler = BatchScheduler::new(&self.store, self.config.batch_size);

        match scheduler.run(&required, &state.processed, &pipeline).await? {
            SchedulerOutcome::Completed { batches, segments } => {
                self.store.commit_version(&version)?;
                info!(
                    event = "sync_committed",
                    version = %version,
                    batches,
                    segments,
                    "all required segments processed; version committed"
                );
                Ok(SyncOutcome::Completed {
                    version,
                    batches,
                    segments,
                })
            }
            SchedulerOutcome::Partial {
                completed_batches,
                failed_batch,
                cause,
            } => {
                warn!(
                    event = "sync_partial",
                    version = %version,
                    completed_batches,
                    failed_batch_first = failed_batch.first().copied(),
                    error = %cause,
                    "sync stopped at last checkpoint; re-invoke to resume"
                );
                Ok(SyncOutcome::Partial {
                    version,
                    completed_batches,
                    cause,
                })
            }
        }
    }

    /// Downloads and parses the mandatory directory index.
    ///
    /// A package whose catalogs carry no index entry is malformed or
    /// incompatible; that is fatal before any checkpoint mutation beyond the
    /// version reset.
    async fn load_directory_index(
        &self,
        catalogs: &[ChannelCatalog],
    ) -> Result<DirectoryIndex, Error> {
        let index_name = self.config.index_file_name();
        let (channel, index_ref) = find_index_entry(catalogs, &index_name)
            .ok_or_else(|| Error::MissingIndexEntry(index_name.clone()))?;

        let dest = self.config.staging_dir.join(&index_name);
        self.client.fetch_file(channel, index_ref, &dest).await?;

        let blob = std::fs::read(&dest).map_err(|source| Error::StagingIo {
            path: dest.clone(),
            source,
        })?;
        let index = DirectoryIndex::parse(&blob)?;

        info!(
            event = "directory_index_loaded",
            channel,
            index_name,
            entries = index.len(),
            "parsed directory index"
        );
        Ok(index)
    }
}

fn validate_config(config: &SyncEngineConfig) -> Result<(), Error> {
    if config.path_filters.is_empty() {
        return Err(Error::InvalidConfig(
            "at least one path filter is required; an empty filter list selects nothing"
                .to_string(),
        ));
    }
    if config.channels.is_empty() {
        return Err(Error::InvalidConfig(
            "at least one distribution channel is required".to_string(),
        ));
    }
    if config.batch_size == 0 {
        return Err(Error::InvalidConfig("batch size must be > 0".to_string()));
    }
    if config.archive_stem.is_empty() {
        return Err(Error::InvalidConfig(
            "archive stem must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Orders snapshot catalogs by the configured channel priority.
///
/// A configured channel absent from the snapshot is logged and skipped; the
/// remote occasionally rotates channels out and the remaining ones are still
/// usable.
fn order_catalogs(snapshot: &ProductSnapshot, channels: &[ChannelId]) -> Vec<ChannelCatalog> {
    let mut ordered = Vec::with_capacity(channels.len());
    for &channel in channels {
        match snapshot.catalog(channel) {
            Some(catalog) => ordered.push(catalog.clone()),
            None => warn!(
                event = "channel_catalog_missing",
                channel, "configured channel absent from product snapshot"
            ),
        }
    }
    ordered
}

fn find_index_entry<'a>(
    catalogs: &'a [ChannelCatalog],
    index_name: &str,
) -> Option<(ChannelId, &'a FileRef)> {
    catalogs.iter().find_map(|catalog| {
        catalog
            .find_by_suffix(index_name)
            .map(|file| (catalog.channel, file))
    })
}
