use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;

use crate::distribution::{
    ChannelCatalog, ChannelId, DistributionClient, DistributionError, FileRef, ProductSnapshot,
    VersionId,
};
use crate::pak_index::{DirectoryIndex, IndexEntry, SegmentId};

use super::pipeline::segment_file_name;
use super::postprocess::{PostProcessError, PostProcessor};
use super::scheduler::BatchProcessor;
use super::types::BatchError;

pub(crate) fn scratch_dir(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("paksync_{label}_{}_{unique}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("failed to create scratch dir");
    dir
}

pub(crate) fn index_blob(entries: &[(&str, SegmentId)]) -> Vec<u8> {
    DirectoryIndex::from_entries(
        entries
            .iter()
            .map(|(path, segment)| IndexEntry {
                path: path.to_string(),
                segment: *segment,
            })
            .collect(),
    )
    .to_bytes()
}

pub(crate) fn catalog(channel: ChannelId, file_names: &[&str]) -> ChannelCatalog {
    ChannelCatalog {
        channel,
        files: file_names
            .iter()
            .map(|name| FileRef {
                name: name.to_string(),
                size: 64,
            })
            .collect(),
    }
}

/// Catalog holding the named segments of the `pak01` family.
pub(crate) fn catalog_with_segments(channel: ChannelId, segments: &[SegmentId]) -> ChannelCatalog {
    let names: Vec<String> = segments
        .iter()
        .map(|&segment| segment_file_name("pak01", segment))
        .collect();
    catalog(channel, &names.iter().map(String::as_str).collect::<Vec<_>>())
}

pub(crate) fn scripted_batch_failure() -> BatchError {
    BatchError::PostProcess(PostProcessError::ToolFailed {
        status: "exit status: 1".to_string(),
        stderr_tail: "scripted failure".to_string(),
    })
}

/// Scripted distribution service used instead of live network access.
///
/// `fetch_file` writes the configured body (or the file name) to the
/// destination so downstream staging logic sees real files on disk.
pub(crate) struct MockDistributionClient {
    snapshot: Mutex<ProductSnapshot>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<(ChannelId, String)>>,
}

impl MockDistributionClient {
    pub(crate) fn new(snapshot: ProductSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            bodies: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_version(&self, version: &str) {
        self.snapshot
            .lock()
            .expect("snapshot mutex poisoned")
            .version = VersionId::new(version);
    }

    pub(crate) fn set_body(&self, file_name: &str, body: Vec<u8>) {
        self.bodies
            .lock()
            .expect("bodies mutex poisoned")
            .insert(file_name.to_string(), body);
    }

    pub(crate) fn fail_fetches_of(&self, file_name: &str) {
        self.failing
            .lock()
            .expect("failing mutex poisoned")
            .insert(file_name.to_string());
    }

    pub(crate) fn fetched(&self) -> Vec<(ChannelId, String)> {
        self.fetched.lock().expect("fetched mutex poisoned").clone()
    }

    pub(crate) fn fetch_count_of(&self, file_name: &str) -> usize {
        self.fetched
            .lock()
            .expect("fetched mutex poisoned")
            .iter()
            .filter(|(_, name)| name == file_name)
            .count()
    }
}

impl DistributionClient for MockDistributionClient {
    fn product_snapshot<'a>(
        &'a self,
        _product_id: u32,
    ) -> BoxFuture<'a, Result<ProductSnapshot, DistributionError>> {
        Box::pin(async move { Ok(self.snapshot.lock().expect("snapshot mutex poisoned").clone()) })
    }

    fn fetch_file<'a>(
        &'a self,
        channel: ChannelId,
        file: &'a FileRef,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), DistributionError>> {
        Box::pin(async move {
            if self
                .failing
                .lock()
                .expect("failing mutex poisoned")
                .contains(&file.name)
            {
                return Err(DistributionError::Connect(format!(
                    "scripted fetch failure for {}",
                    file.name
                )));
            }

            let body = self
                .bodies
                .lock()
                .expect("bodies mutex poisoned")
                .get(&file.name)
                .cloned()
                .unwrap_or_else(|| file.name.clone().into_bytes());

            std::fs::write(dest, body).map_err(|source| DistributionError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

            self.fetched
                .lock()
                .expect("fetched mutex poisoned")
                .push((channel, file.name.clone()));
            Ok(())
        })
    }
}

/// Scripted post-processor; defaults to success once the plan is exhausted.
#[derive(Default)]
pub(crate) struct MockPostProcessor {
    outcomes: Mutex<VecDeque<Result<(), PostProcessError>>>,
    batches: Mutex<Vec<Vec<SegmentId>>>,
}

impl MockPostProcessor {
    pub(crate) fn with_outcomes(outcomes: Vec<Result<(), PostProcessError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Fails the `fail_at`-th invocation (1-based), succeeding otherwise.
    pub(crate) fn failing_at(fail_at: usize) -> Self {
        let mut outcomes: Vec<Result<(), PostProcessError>> = Vec::new();
        for call in 1..=fail_at {
            if call == fail_at {
                outcomes.push(Err(PostProcessError::ToolFailed {
                    status: "exit status: 1".to_string(),
                    stderr_tail: "scripted failure".to_string(),
                }));
            } else {
                outcomes.push(Ok(()));
            }
        }
        Self::with_outcomes(outcomes)
    }

    pub(crate) fn calls(&self) -> usize {
        self.batches.lock().expect("batches mutex poisoned").len()
    }

    pub(crate) fn batches(&self) -> Vec<Vec<SegmentId>> {
        self.batches.lock().expect("batches mutex poisoned").clone()
    }
}

impl PostProcessor for MockPostProcessor {
    fn process<'a>(
        &'a self,
        batch: &'a [SegmentId],
        _staging_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), PostProcessError>> {
        Box::pin(async move {
            self.batches
                .lock()
                .expect("batches mutex poisoned")
                .push(batch.to_vec());
            self.outcomes
                .lock()
                .expect("outcomes mutex poisoned")
                .pop_front()
                .unwrap_or(Ok(()))
        })
    }
}

/// Scripted batch processor for scheduler-only tests.
#[derive(Default)]
pub(crate) struct MockBatchProcessor {
    outcomes: Mutex<VecDeque<Result<(), BatchError>>>,
    batches: Mutex<Vec<Vec<SegmentId>>>,
}

impl MockBatchProcessor {
    pub(crate) fn with_outcomes(outcomes: Vec<Result<(), BatchError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn batches(&self) -> Vec<Vec<SegmentId>> {
        self.batches.lock().expect("batches mutex poisoned").clone()
    }
}

impl BatchProcessor for MockBatchProcessor {
    fn process_batch<'a>(
        &'a self,
        batch: &'a [SegmentId],
    ) -> BoxFuture<'a, Result<(), BatchError>> {
        Box::pin(async move {
            self.batches
                .lock()
                .expect("batches mutex poisoned")
                .push(batch.to_vec());
            self.outcomes
                .lock()
                .expect("outcomes mutex poisoned")
                .pop_front()
                .unwrap_or(Ok(()))
        })
    }
}

/// Tiny deterministic generator for randomized property-style tests.
pub(crate) struct SplitMix(u64);

impl SplitMix {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-ish value in `[low, high]`.
    pub(crate) fn next_in(&mut self, low: u64, high: u64) -> u64 {
        low + self.next_u64() % (high - low + 1)
    }
}
