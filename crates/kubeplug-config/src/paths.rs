//! Derives the on-disk layout shared by every lifecycle operation.
//!
//! All managed state lives beneath a single root directory. Plugin names and
//! versions are joined verbatim, so callers validate names before asking for
//! per-plugin paths.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const BIN_DIR: &str = "bin";
const STORE_DIR: &str = "store";
const RECEIPTS_DIR: &str = "receipts";
const DOWNLOADS_DIR: &str = "downloads";
const LOCKS_DIR: &str = "locks";
const RECEIPT_EXTENSION: &str = "yaml";
const LOCK_EXTENSION: &str = "lock";

/// Canonical paths for installed plugins, links, receipts and scratch space.
///
/// # Example
///
/// ```ignore
/// use kubeplug_config::Paths;
///
/// let paths = Paths::new("/home/me/.kubeplug");
/// assert!(paths.plugin_receipt_path("foo").ends_with("receipts/foo.yaml"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base_dir: PathBuf,
    bin_dir: PathBuf,
    store_dir: PathBuf,
    receipts_dir: PathBuf,
    download_dir: PathBuf,
    locks_dir: PathBuf,
}

impl Paths {
    /// Derives the layout beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let base_dir = root.into();
        Self {
            bin_dir: base_dir.join(BIN_DIR),
            store_dir: base_dir.join(STORE_DIR),
            receipts_dir: base_dir.join(RECEIPTS_DIR),
            download_dir: base_dir.join(DOWNLOADS_DIR),
            locks_dir: base_dir.join(LOCKS_DIR),
            base_dir,
        }
    }

    /// Creates every top-level directory of the layout.
    ///
    /// # Errors
    ///
    /// Returns [`PathsError::CreateDirectory`] naming the first directory
    /// that could not be created.
    pub fn ensure_layout(&self) -> Result<(), PathsError> {
        for dir in [
            &self.bin_dir,
            &self.store_dir,
            &self.receipts_dir,
            &self.download_dir,
            &self.locks_dir,
        ] {
            fs::create_dir_all(dir).map_err(|source| PathsError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Root directory holding all managed state.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.base_dir.as_path()
    }

    /// Shared directory holding every plugin's link.
    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        self.bin_dir.as_path()
    }

    /// Directory holding per-plugin install directories.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        self.store_dir.as_path()
    }

    /// Directory holding install receipts.
    #[must_use]
    pub fn receipts_dir(&self) -> &Path {
        self.receipts_dir.as_path()
    }

    /// Root for per-attempt staging directories.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        self.download_dir.as_path()
    }

    /// Directory holding advisory lock files.
    #[must_use]
    pub fn locks_dir(&self) -> &Path {
        self.locks_dir.as_path()
    }

    /// Directory holding every installed version of `name`.
    #[must_use]
    pub fn plugin_install_dir(&self, name: &str) -> PathBuf {
        self.store_dir.join(name)
    }

    /// Install directory for one version of `name`.
    #[must_use]
    pub fn plugin_version_install_dir(&self, name: &str, version: &str) -> PathBuf {
        self.plugin_install_dir(name).join(version)
    }

    /// Receipt path for `name`. Keyed by name only, never by version.
    #[must_use]
    pub fn plugin_receipt_path(&self, name: &str) -> PathBuf {
        self.receipts_dir.join(format!("{name}.{RECEIPT_EXTENSION}"))
    }

    /// Advisory lock file for `name`.
    #[must_use]
    pub fn plugin_lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{name}.{LOCK_EXTENSION}"))
    }
}

/// Errors raised while preparing the directory layout.
#[derive(Debug, Error)]
pub enum PathsError {
    /// Creating a layout directory failed.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
