//! Install receipts: the persisted record of what is installed.
//!
//! A readable receipt at [`Paths::plugin_receipt_path`] is the only
//! definition of "installed". Receipts hold the manifest exactly as it was
//! installed and are written atomically so readers never see a partial
//! document.
//!
//! [`Paths::plugin_receipt_path`]: kubeplug_config::Paths::plugin_receipt_path

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use crate::error::InstallError;
use crate::manifest::Plugin;

const RECEIPT_EXTENSION: &str = "yaml";

/// Reads the receipt at `path`.
///
/// Returns `Ok(None)` when no receipt exists.
///
/// # Errors
///
/// Returns [`InstallError::Io`] when the file exists but cannot be read and
/// [`InstallError::Receipt`] when it does not decode.
pub fn load(path: &Path) -> Result<Option<Plugin>, InstallError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(InstallError::io("read receipt", path, error)),
    };
    Plugin::from_yaml(&text)
        .map(Some)
        .map_err(|error| InstallError::Receipt {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
}

/// Writes `plugin` as the receipt at `path`.
///
/// # Errors
///
/// Returns [`InstallError::Receipt`] when encoding fails and
/// [`InstallError::Io`] when the file cannot be written.
pub fn store(plugin: &Plugin, path: &Path) -> Result<(), InstallError> {
    let text = plugin.to_yaml().map_err(|error| InstallError::Receipt {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    atomic_write(path, text.as_bytes()).map_err(InstallError::io_with("write receipt", path))?;
    debug!(plugin = plugin.name(), receipt = %path.display(), "stored receipt");
    Ok(())
}

/// Removes the receipt at `path`.
///
/// # Errors
///
/// Returns [`InstallError::Io`] when the file cannot be removed.
pub fn delete(path: &Path) -> Result<(), InstallError> {
    fs::remove_file(path).map_err(InstallError::io_with("remove receipt", path))?;
    debug!(receipt = %path.display(), "deleted receipt");
    Ok(())
}

/// Loads every receipt in `dir`, sorted by plugin name.
///
/// A missing directory holds no receipts.
///
/// # Errors
///
/// Returns the first read or decode failure.
pub fn load_all(dir: &Path) -> Result<Vec<Plugin>, InstallError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(InstallError::io("list receipts in", dir, error)),
    };
    let mut plugins = Vec::new();
    for item in entries {
        let entry = item.map_err(InstallError::io_with("list receipts in", dir))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(RECEIPT_EXTENSION) {
            continue;
        }
        if let Some(plugin) = load(&path)? {
            plugins.push(plugin);
        }
    }
    plugins.sort_by(|left, right| left.name().cmp(right.name()));
    Ok(plugins)
}

/// Writes the bytes to `path` through a synced temporary file in the same
/// directory.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "receipt path did not have a parent directory",
        )
    })?;
    fs::create_dir_all(directory)?;

    let mut builder = Builder::new();
    builder.prefix(".receipt-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
