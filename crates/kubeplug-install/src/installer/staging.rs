//! Scoped directories released on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;
use crate::error::InstallError;

/// Per-attempt scratch directory beneath the download root.
#[derive(Debug)]
pub(super) struct StagingArea {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl StagingArea {
    pub(super) fn create(download_dir: &Path, plugin_name: &str) -> Result<Self, InstallError> {
        fs::create_dir_all(download_dir)
            .map_err(InstallError::io_with("create directory", download_dir))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{plugin_name}-"))
            .tempdir_in(download_dir)
            .map_err(InstallError::io_with("create staging directory in", download_dir))?;
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub(super) fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if let Err(error) = dir.close() {
            warn!(
                target: LIFECYCLE_TARGET,
                dir = %self.path.display(),
                error = %error,
                "failed to remove staging directory"
            );
        }
    }
}

/// Removes a versioned install directory unless the install commits.
///
/// The plugin directory above it is removed too when that leaves it empty.
#[derive(Debug)]
pub(super) struct InstallDirGuard {
    version_dir: PathBuf,
    committed: bool,
}

impl InstallDirGuard {
    pub(super) fn new(version_dir: &Path) -> Self {
        Self {
            version_dir: version_dir.to_path_buf(),
            committed: false,
        }
    }

    pub(super) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for InstallDirGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_dir_all(&self.version_dir) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    dir = %self.version_dir.display(),
                    error = %error,
                    "failed to roll back install directory"
                );
            }
            _ => {}
        }
        // Fails harmlessly while other versions remain.
        if let Some(parent) = self.version_dir.parent()
            && fs::remove_dir(parent).is_ok()
        {
            debug!(
                target: LIFECYCLE_TARGET,
                dir = %parent.display(),
                "removed empty plugin directory"
            );
        }
    }
}
