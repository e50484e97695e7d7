//! Move finished runs out of the scanned area.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("run directory {0} has no base name")]
    InvalidRunDir(PathBuf),

    #[error("archive destination {path} already exists")]
    DestinationExists { path: PathBuf },

    #[error("move failed: {reason}")]
    MoveFailed { reason: String },
}

/// Move `run_dir` to `archive_root/<base name>`, creating `archive_root` if needed.
///
/// Uses a plain rename: the archive root is expected on the same filesystem
/// as the data dir. A cross-device layout is reported as `MoveFailed`.
#[instrument(
    skip_all,
    fields(run_dir = %run_dir.display(), archive_root = %archive_root.display())
)]
pub fn archive_run(run_dir: &Path, archive_root: &Path) -> Result<PathBuf, ArchiveError> {
    let name = run_dir
        .file_name()
        .ok_or_else(|| ArchiveError::InvalidRunDir(run_dir.to_path_buf()))?;
    let destination = archive_root.join(name);

    if destination.exists() {
        warn!(destination = %destination.display(), "archive destination already exists");
        return Err(ArchiveError::DestinationExists { path: destination });
    }
    fs::create_dir_all(archive_root).map_err(|err| ArchiveError::MoveFailed {
        reason: format!("create {}: {err}", archive_root.display()),
    })?;
    fs::rename(run_dir, &destination).map_err(|err| ArchiveError::MoveFailed {
        reason: format!(
            "rename {} -> {}: {err}",
            run_dir.display(),
            destination.display()
        ),
    })?;

    info!(destination = %destination.display(), "run archived");
    Ok(destination)
}
