use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::pak_index::SegmentId;

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("failed to launch post-process tool {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("post-process tool exited with {status}: {stderr_tail}")]
    ToolFailed { status: String, stderr_tail: String },
}

/// Per-batch transform step invoked after all of the batch's fetches settle.
///
/// The hook is stateless from the engine's point of view: it operates on the
/// whole staging directory and reports no per-segment granularity back. Any
/// failure is a batch failure.
pub trait PostProcessor: Send + Sync {
    fn process<'a>(
        &'a self,
        batch: &'a [SegmentId],
        staging_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), PostProcessError>>;
}

/// Settings for the external extraction tool.
#[derive(Debug, Clone)]
pub struct ExtractToolConfig {
    pub program: PathBuf,
    pub output_dir: PathBuf,
    /// Content-type filter forwarded to the tool, e.g. `image`.
    pub content_filter: String,
    pub recursive: bool,
}

/// Runs the external extraction tool as a subprocess.
///
/// Argument contract is fixed: input archive root, output directory,
/// content-type filter, and an optional recursive flag. Success is a zero
/// exit status; anything else fails the batch with the tool's stderr tail.
pub struct ExtractToolProcessor {
    config: ExtractToolConfig,
}

impl ExtractToolProcessor {
    pub fn new(config: ExtractToolConfig) -> Self {
        Self { config }
    }
}

impl PostProcessor for ExtractToolProcessor {
    fn process<'a>(
        &'a self,
        batch: &'a [SegmentId],
        staging_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), PostProcessError>> {
        Box::pin(async move {
            let mut command = tokio::process::Command::new(&self.config.program);
            command
                .arg(staging_dir)
                .arg(&self.config.output_dir)
                .arg(&self.config.content_filter);
            if self.config.recursive {
                command.arg("--recursive");
            }

            info!(
                event = "post_process_started",
                program = %self.config.program.display(),
                segments = batch.len(),
                staging_dir = %staging_dir.display(),
                "running extraction tool"
            );

            let output = command
                .output()
                .await
                .map_err(|source| PostProcessError::Spawn {
                    program: self.config.program.display().to_string(),
                    source,
                })?;

            if !output.status.success() {
                return Err(PostProcessError::ToolFailed {
                    status: output.status.to_string(),
                    stderr_tail: stderr_tail(&output.stderr),
                });
            }

            Ok(())
        })
    }
}

const STDERR_TAIL_LIMIT: usize = 512;

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_LIMIT {
        return trimmed.to_string();
    }

    let start = trimmed.len() - STDERR_TAIL_LIMIT;
    // Avoid slicing through a multi-byte character.
    let boundary = (start..trimmed.len())
        .find(|idx| trimmed.is_char_boundary(*idx))
        .unwrap_or(trimmed.len());
    trimmed[boundary..].to_string()
}
