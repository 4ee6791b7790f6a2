use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::distribution::VersionId;
use crate::pak_index::SegmentId;

use super::types::{CheckpointError, SyncState};

/// File-backed checkpoint record.
///
/// Every mutation is a read-modify-write of the whole record, flushed with a
/// write-to-temp-then-rename so a crash mid-write can never truncate
/// previously durable progress.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted state.
    ///
    /// A missing file is the normal first-run case and yields an empty state;
    /// any other read or parse failure is fatal, since proceeding with an
    /// unknown progress state would risk redundant or skipped work.
    pub fn load(&self) -> Result<SyncState, CheckpointError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SyncState::default()),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Ok(serde_json::from_str(&raw)?)
    }

    /// Clears prior progress and attributes future batches to `version`.
    ///
    /// Does not mark `version` as committed; that happens only after the full
    /// required set is confirmed processed.
    pub fn reset_for_new_version(&self, version: &VersionId) -> Result<(), CheckpointError> {
        let mut state = self.load()?;
        state.in_progress_version = Some(version.clone());
        state.processed.clear();
        state.required = None;
        self.write_atomic(&state)
    }

    /// Snapshots the required set for the in-progress revision.
    ///
    /// Processed ids that fell out of the required set (filters narrowed
    /// between runs) are pruned so `processed` stays a subset of `required`.
    pub fn record_required(
        &self,
        required: &BTreeSet<SegmentId>,
    ) -> Result<SyncState, CheckpointError> {
        let mut state = self.load()?;
        if state.in_progress_version.is_none() {
            return Err(CheckpointError::InvalidOperation(
                "recorded a required set with no in-progress version".to_string(),
            ));
        }

        state.processed.retain(|segment| required.contains(segment));
        state.required = Some(required.clone());
        self.write_atomic(&state)?;
        Ok(state)
    }

    /// Idempotent durable append of one completed batch.
    ///
    /// Returns the updated state so callers can log progress without a second
    /// read.
    pub fn record_processed(&self, batch: &[SegmentId]) -> Result<SyncState, CheckpointError> {
        let mut state = self.load()?;
        if state.in_progress_version.is_none() {
            return Err(CheckpointError::InvalidOperation(
                "recorded batch progress with no in-progress version".to_string(),
            ));
        }
        if let Some(required) = &state.required {
            if let Some(stray) = batch.iter().find(|segment| !required.contains(segment)) {
                return Err(CheckpointError::InvalidOperation(format!(
                    "segment {stray} is not in the required set for this run"
                )));
            }
        }

        state.processed.extend(batch.iter().copied());
        self.write_atomic(&state)?;
        Ok(state)
    }

    /// Marks `version` fully synced.
    ///
    /// Refuses to commit unless the recorded required set is covered by
    /// `processed` and the in-progress attribution matches.
    pub fn commit_version(&self, version: &VersionId) -> Result<(), CheckpointError> {
        let mut state = self.load()?;
        if state.in_progress_version.as_ref() != Some(version) {
            return Err(CheckpointError::InvalidOperation(format!(
                "commit requested for {version} but in-progress version is {:?}",
                state.in_progress_version
            )));
        }
        if let Some(required) = &state.required {
            if !required.is_subset(&state.processed) {
                return Err(CheckpointError::InvalidOperation(format!(
                    "commit requested for {version} with {}/{} required segments processed",
                    required.intersection(&state.processed).count(),
                    required.len()
                )));
            }
        }

        state.last_committed_version = Some(version.clone());
        state.in_progress_version = None;
        state.processed.clear();
        state.required = None;
        self.write_atomic(&state)
    }

    fn write_atomic(&self, state: &SyncState) -> Result<(), CheckpointError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: parent.to_path_buf(),
            source,
        })?;

        let payload = serde_json::to_vec_pretty(state)?;
        // Temp file in the same directory so the rename stays on one filesystem.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &payload).map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}
