use std::path::PathBuf;
use thiserror::Error;

use crate::distribution::{ChannelId, DistributionError};
use crate::pak_index::SegmentId;

use super::postprocess::PostProcessError;

/// Policy for a required segment that no channel catalog can supply.
///
/// The remote catalog is allowed to have availability gaps; skipping keeps
/// the rest of the sync moving, while failing makes the gap visible at the
/// batch boundary. Skip-and-log is the default because gaps are routine in
/// observed catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSegmentPolicy {
    #[default]
    SkipAndLog,
    FailBatch,
}

/// Engine-level settings for one sync run.
///
/// All knobs are explicit constructor input; nothing is read from ambient
/// globals once a run starts.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub product_id: u32,
    /// Channel priority order used for catalog lookups.
    pub channels: Vec<ChannelId>,
    /// Path prefixes selecting which index entries to mirror.
    pub path_filters: Vec<String>,
    /// Maximum segments per checkpointed batch.
    pub batch_size: usize,
    /// Concurrent segment downloads within one batch.
    pub fetch_parallelism: usize,
    pub staging_dir: PathBuf,
    /// Archive family stem, e.g. `pak01` names `pak01_dir.vpk` and
    /// `pak01_042.vpk`.
    pub archive_stem: String,
    pub missing_segment_policy: MissingSegmentPolicy,
    /// Extraction output tree to sweep after each successful batch, when the
    /// run treats extracted output as transient.
    pub transient_output: Option<PathBuf>,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            product_id: 570,
            channels: Vec::new(),
            path_filters: Vec::new(),
            batch_size: 10,
            fetch_parallelism: 4,
            staging_dir: PathBuf::from("./temp"),
            archive_stem: "pak01".to_string(),
            missing_segment_policy: MissingSegmentPolicy::default(),
            transient_output: None,
        }
    }
}

impl SyncEngineConfig {
    /// Conventional file name of the directory index for this archive family.
    pub fn index_file_name(&self) -> String {
        format!("{}_dir.vpk", self.archive_stem)
    }
}

/// Result of resolving and downloading one segment within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentFetchOutcome {
    Fetched {
        segment: SegmentId,
        channel: ChannelId,
        path: PathBuf,
    },
    /// No channel catalog listed the segment's backing file.
    NotFound { segment: SegmentId },
}

/// Failure of one batch; surfaced through the scheduler without partial
/// credit for the failed batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("segment {segment} is not present in any configured channel")]
    MissingSegment { segment: SegmentId },
    #[error(transparent)]
    Fetch(#[from] DistributionError),
    #[error(transparent)]
    PostProcess(#[from] PostProcessError),
}

/// Terminal outcome of one scheduler drive.
#[derive(Debug)]
pub enum SchedulerOutcome {
    Completed {
        batches: usize,
        segments: usize,
    },
    /// Progress stopped at the last checkpointed batch; re-invoking the
    /// engine resumes from there.
    Partial {
        completed_batches: usize,
        failed_batch: Vec<SegmentId>,
        cause: BatchError,
    },
}
