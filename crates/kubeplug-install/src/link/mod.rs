//! Publishes plugin executables into the shared bin directory.
//!
//! Each installed plugin is exposed through a single symlink named after
//! the plugin. Anything at that path that is not a symlink belongs to the
//! user and is never removed.
//!
//! Replacement is atomic: the new link is created under a random name in
//! the bin directory and renamed over the final name, so a link exists at
//! every instant of an upgrade.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::InstallError;
use crate::platform::HostPlatform;

/// Prefix of every published executable name.
pub const BIN_PREFIX: &str = "kubectl-";
const WINDOWS_SUFFIX: &str = ".exe";
const TEMP_LINK_PREFIX: &str = ".kubectl-link-";

/// Derives the published executable name for `plugin_name`.
///
/// # Example
///
/// ```
/// use kubeplug_install::{HostPlatform, plugin_name_to_bin};
///
/// let linux = HostPlatform::new("linux", "amd64");
/// assert_eq!(plugin_name_to_bin("view-secret", &linux), "kubectl-view_secret");
/// let windows = HostPlatform::new("windows", "amd64");
/// assert_eq!(plugin_name_to_bin("foo", &windows), "kubectl-foo.exe");
/// ```
#[must_use]
pub fn plugin_name_to_bin(plugin_name: &str, host: &HostPlatform) -> String {
    let mut name = format!("{BIN_PREFIX}{}", plugin_name.replace('-', "_"));
    if host.is_windows() {
        name.push_str(WINDOWS_SUFFIX);
    }
    name
}

/// Path of the link for `plugin_name` inside `bin_dir`.
#[must_use]
pub fn link_path(bin_dir: &Path, plugin_name: &str, host: &HostPlatform) -> PathBuf {
    bin_dir.join(plugin_name_to_bin(plugin_name, host))
}

/// Points the plugin's link at `binary`, replacing any previous link.
///
/// Returns the link path.
///
/// # Errors
///
/// Returns [`InstallError::ForeignFileAtLinkPath`] when a non-symlink
/// occupies the link path, [`InstallError::BinaryNotFound`] when `binary`
/// does not exist, and [`InstallError::Io`] when the link cannot be
/// created.
pub fn publish(
    bin_dir: &Path,
    binary: &Path,
    plugin_name: &str,
    host: &HostPlatform,
) -> Result<PathBuf, InstallError> {
    let link = link_path(bin_dir, plugin_name, host);
    ensure_not_foreign(&link)?;
    match fs::metadata(binary) {
        Ok(metadata) if !metadata.is_dir() => {}
        Ok(_) => {
            return Err(InstallError::BinaryNotFound {
                path: binary.to_path_buf(),
            });
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(InstallError::BinaryNotFound {
                path: binary.to_path_buf(),
            });
        }
        Err(error) => return Err(InstallError::io("inspect binary", binary, error)),
    }

    fs::create_dir_all(bin_dir).map_err(InstallError::io_with("create directory", bin_dir))?;
    let staged = tempfile::Builder::new()
        .prefix(TEMP_LINK_PREFIX)
        .make_in(bin_dir, |path| symlink(binary, path))
        .map_err(InstallError::io_with("create link in", bin_dir))?;
    staged
        .persist(&link)
        .map_err(|error| InstallError::io("replace link", &link, error.error))?;
    debug!(link = %link.display(), target = %binary.display(), "published link");
    Ok(link)
}

/// Removes the link at `path`.
///
/// A missing path is not an error.
///
/// # Errors
///
/// Returns [`InstallError::ForeignFileAtLinkPath`] when `path` is not a
/// symlink and [`InstallError::Io`] when removal fails.
pub fn unlink(path: &Path) -> Result<(), InstallError> {
    match fs::symlink_metadata(path) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(link = %path.display(), "no link to remove");
            Ok(())
        }
        Err(error) => Err(InstallError::io("inspect link", path, error)),
        Ok(metadata) if !metadata.file_type().is_symlink() => {
            Err(InstallError::ForeignFileAtLinkPath {
                path: path.to_path_buf(),
            })
        }
        Ok(_) => {
            fs::remove_file(path).map_err(InstallError::io_with("remove link", path))?;
            debug!(link = %path.display(), "removed link");
            Ok(())
        }
    }
}

fn ensure_not_foreign(link: &Path) -> Result<(), InstallError> {
    match fs::symlink_metadata(link) {
        Ok(metadata) if !metadata.file_type().is_symlink() => {
            Err(InstallError::ForeignFileAtLinkPath {
                path: link.to_path_buf(),
            })
        }
        Ok(_) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(InstallError::io("inspect link", link, error)),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
