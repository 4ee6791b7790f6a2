use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Removes the staged files of a confirmed-successful batch.
///
/// Cleanup is best-effort: a leftover staged file only costs disk space and
/// is overwritten by any future retry, so failures are logged rather than
/// surfaced. Never called for a failed batch; its artifacts stay available
/// for inspection and retry.
pub(crate) async fn sweep_staged_files(staged: &[PathBuf]) {
    for path in staged {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(event = "staged_file_removed", path = %path.display(), "removed staged segment"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                event = "staged_file_cleanup_failed",
                path = %path.display(),
                error = %err,
                "failed to remove staged segment file"
            ),
        }
    }
}

/// Removes the transient extraction output tree, when the run is configured
/// to treat it as ephemeral.
pub(crate) async fn sweep_transient_output(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(event = "transient_output_removed", dir = %dir.display(), "removed extraction output tree"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            event = "transient_output_cleanup_failed",
            dir = %dir.display(),
            error = %err,
            "failed to remove extraction output tree"
        ),
    }
}
