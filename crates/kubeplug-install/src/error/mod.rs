//! Domain errors raised by lifecycle operations.
//!
//! All errors use a `thiserror`-derived enum with structured context so
//! callers can render friendly messages for the sentinel conditions and
//! inspect everything else programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from install, upgrade, and uninstall.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A receipt for the plugin already exists.
    #[error("can't install '{name}', the newest version is already installed")]
    AlreadyInstalled {
        /// Plugin name.
        name: String,
    },

    /// No receipt exists for the plugin.
    #[error("plugin '{name}' is not installed")]
    NotInstalled {
        /// Plugin name.
        name: String,
    },

    /// The installed version is not older than the offered one.
    #[error("can't upgrade '{name}', version {version} is already installed")]
    AlreadyUpgraded {
        /// Plugin name.
        name: String,
        /// Version currently recorded in the receipt.
        version: String,
    },

    /// No platform entry of the manifest matches the host.
    #[error("plugin '{name}' does not offer installation for {os}/{arch}")]
    UnsupportedPlatform {
        /// Plugin name.
        name: String,
        /// OS label used for matching.
        os: String,
        /// Architecture label used for matching.
        arch: String,
    },

    /// The fetched archive did not hash to the expected digest.
    #[error("checksum mismatch for '{source_locator}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// URI or override path the bytes came from.
        source_locator: String,
        /// Digest declared by the manifest.
        expected: String,
        /// Digest computed over the fetched bytes.
        actual: String,
    },

    /// A path resolved outside the directory that must contain it.
    #[error("path '{path}' escapes '{root}'")]
    PathTraversal {
        /// Offending path.
        path: PathBuf,
        /// Directory the path must stay within.
        root: PathBuf,
    },

    /// Something other than a symlink occupies a plugin's link path.
    #[error("'{path}' is not a symlink; refusing to replace it")]
    ForeignFileAtLinkPath {
        /// Link path.
        path: PathBuf,
    },

    /// The manager refuses to uninstall itself.
    #[error("removing '{name}' through itself is not supported; delete '{base_dir}' instead")]
    SelfUninstallNotAllowed {
        /// Reserved name that was requested.
        name: String,
        /// Root directory the user can remove by hand.
        base_dir: PathBuf,
    },

    /// The executable the link should point at does not exist.
    #[error("binary '{path}' cannot be found in the extracted archive")]
    BinaryNotFound {
        /// Expected binary path.
        path: PathBuf,
    },

    /// The plugin name is unsafe to use as a path component.
    #[error("invalid plugin name '{name}': {reason}")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A plugin manifest failed validation or decoding.
    #[error("manifest error: {message}")]
    Manifest {
        /// Description of the validation failure.
        message: String,
    },

    /// The archive could not be fetched.
    #[error("failed to fetch '{source_locator}': {message}")]
    Fetch {
        /// URI or override path that was requested.
        source_locator: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The archive could not be extracted.
    #[error("failed to extract '{source_locator}': {message}")]
    Extract {
        /// URI or override path the archive came from.
        source_locator: String,
        /// Human-readable failure description.
        message: String,
    },

    /// A receipt could not be encoded or decoded.
    #[error("receipt '{path}' is unusable: {message}")]
    Receipt {
        /// Receipt path.
        path: PathBuf,
        /// Human-readable failure description.
        message: String,
    },

    /// Another live process holds the plugin's advisory lock.
    #[error("plugin '{name}' is busy; lock held at '{lock_path}'")]
    Busy {
        /// Plugin name.
        name: String,
        /// Lock file path.
        lock_path: PathBuf,
    },

    /// A filesystem or OS operation failed.
    #[error("failed to {operation} '{path}': {source}")]
    Io {
        /// Short description of the attempted operation.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl InstallError {
    /// Wraps an I/O error with the operation and path it concerned.
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Builds a closure suitable for `map_err` on I/O results.
    pub(crate) fn io_with(operation: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::io(operation, path, source)
    }

    /// Returns `true` for the lifecycle sentinels callers usually render as
    /// friendly messages rather than failures.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInstalled { .. } | Self::NotInstalled { .. } | Self::AlreadyUpgraded { .. }
        )
    }
}
