use crate::distribution::VersionId;
use crate::pak_index::SegmentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("invalid checkpoint operation: {0}")]
    InvalidOperation(String),
}

/// Persisted root of sync progress.
///
/// `processed` and `required` always describe `in_progress_version`; a version
/// change fully invalidates them before any new batch runs, so partial
/// progress can never be attributed to the wrong revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last revision for which the full required set was confirmed processed.
    pub last_committed_version: Option<VersionId>,
    /// Revision the current `processed` set belongs to, if a run is underway.
    pub in_progress_version: Option<VersionId>,
    /// Segments fetched and post-processed successfully for the in-progress
    /// revision.
    #[serde(default)]
    pub processed: BTreeSet<SegmentId>,
    /// Snapshot of the required set computed during the last selection pass.
    #[serde(default)]
    pub required: Option<BTreeSet<SegmentId>>,
}

impl SyncState {
    /// True when `version` was fully synced and no newer work is underway.
    pub fn is_committed(&self, version: &VersionId) -> bool {
        self.last_committed_version.as_ref() == Some(version)
    }

    /// True when interrupted progress for `version` exists.
    pub fn has_progress_for(&self, version: &VersionId) -> bool {
        self.in_progress_version.as_ref() == Some(version)
    }
}
