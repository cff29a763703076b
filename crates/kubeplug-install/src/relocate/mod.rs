//! Moves extracted files into a plugin's versioned install directory.
//!
//! Each [`FileOperation`] globs relative to the staging root and moves every
//! match into `<install>/<to>/<basename>`. Operations run in order, so a
//! later rule overwrites what an earlier one placed. A rule matching nothing
//! is not an error.
//!
//! Files are assembled in a temporary sibling of the install directory and
//! renamed into place at the end, so the install directory is either absent
//! or complete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::InstallError;
use crate::manifest::FileOperation;
use crate::pathguard::{is_sub_path, normalize_lexically};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Rules applied when a platform declares no file operations: everything at
/// the archive root lands at the install root.
#[must_use]
pub fn default_file_operations() -> Vec<FileOperation> {
    vec![FileOperation::new("*", ".")]
}

/// Returns `files`, or the defaults when it is empty.
#[must_use]
pub fn effective_operations(files: &[FileOperation]) -> Vec<FileOperation> {
    if files.is_empty() {
        default_file_operations()
    } else {
        files.to_vec()
    }
}

/// Applies `operations` from `staging` into `install_dir`.
///
/// Any existing `install_dir` is replaced.
///
/// # Errors
///
/// Returns [`InstallError::PathTraversal`] when a rule reads outside the
/// staging root or writes outside the install root,
/// [`InstallError::Manifest`] for malformed globs, and [`InstallError::Io`]
/// for filesystem failures.
pub fn move_to_install_dir(
    staging: &Path,
    install_dir: &Path,
    operations: &[FileOperation],
) -> Result<(), InstallError> {
    let parent = install_dir.parent().ok_or_else(|| InstallError::PathTraversal {
        path: install_dir.to_path_buf(),
        root: install_dir.to_path_buf(),
    })?;
    fs::create_dir_all(parent).map_err(InstallError::io_with("create directory", parent))?;
    let assembly = tempfile::Builder::new()
        .prefix(".relocate-")
        .tempdir_in(parent)
        .map_err(InstallError::io_with("create temporary directory in", parent))?;

    for operation in operations {
        apply_operation(staging, assembly.path(), operation)?;
    }

    // Temporary directories are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(assembly.path(), fs::Permissions::from_mode(0o755))
            .map_err(InstallError::io_with("set permissions on", assembly.path()))?;
    }

    if install_dir.exists() {
        fs::remove_dir_all(install_dir)
            .map_err(InstallError::io_with("remove stale install directory", install_dir))?;
    }
    move_path(assembly.path(), install_dir)?;
    debug!(install_dir = %install_dir.display(), "install directory populated");
    Ok(())
}

fn apply_operation(
    staging: &Path,
    assembly: &Path,
    operation: &FileOperation,
) -> Result<(), InstallError> {
    let to = Path::new(&operation.to);
    let to_clean = normalize_lexically(to)
        .filter(|_| !to.is_absolute())
        .ok_or_else(|| InstallError::PathTraversal {
            path: to.to_path_buf(),
            root: assembly.to_path_buf(),
        })?;
    let from = Path::new(&operation.from);
    if from.is_absolute() {
        return Err(InstallError::PathTraversal {
            path: from.to_path_buf(),
            root: staging.to_path_buf(),
        });
    }

    let staging_text = staging.to_str().ok_or_else(|| InstallError::Manifest {
        message: format!("staging path '{}' is not valid UTF-8", staging.display()),
    })?;
    let pattern = format!("{}/{}", Pattern::escape(staging_text), operation.from);
    let matches = glob::glob_with(&pattern, MATCH_OPTIONS).map_err(|error| InstallError::Manifest {
        message: format!("invalid file pattern '{}': {error}", operation.from),
    })?;

    let dest_dir = assembly.join(&to_clean);
    for item in matches {
        let source = item.map_err(|error| {
            let path = error.path().to_path_buf();
            InstallError::io("read", &path, error.into_error())
        })?;
        move_match(staging, &source, assembly, &dest_dir)?;
    }
    Ok(())
}

fn move_match(
    staging: &Path,
    source: &Path,
    assembly: &Path,
    dest_dir: &Path,
) -> Result<(), InstallError> {
    let normalized_source = normalize_lexically(source).filter(|path| is_sub_path(staging, path));
    let (Some(normalized), Some(name)) = (normalized_source, source.file_name()) else {
        return Err(InstallError::PathTraversal {
            path: source.to_path_buf(),
            root: staging.to_path_buf(),
        });
    };
    if normalized == staging {
        return Err(InstallError::PathTraversal {
            path: source.to_path_buf(),
            root: staging.to_path_buf(),
        });
    }
    let dest = dest_dir.join(name);
    if !is_sub_path(assembly, &dest) {
        return Err(InstallError::PathTraversal {
            path: dest,
            root: assembly.to_path_buf(),
        });
    }

    fs::create_dir_all(dest_dir).map_err(InstallError::io_with("create directory", dest_dir))?;
    if fs::symlink_metadata(&dest).is_ok() {
        remove_path(&dest)?;
    }
    debug!(from = %normalized.display(), to = %dest.display(), "moving file");
    move_path(&normalized, &dest)
}

/// Renames `from` to `to`, copying when the two live on different
/// filesystems.
fn move_path(from: &Path, to: &Path) -> Result<(), InstallError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            copy_tree(from, to).map_err(InstallError::io_with("copy", from))?;
            remove_path(from)
        }
        Err(error) => Err(InstallError::io("move", from, error)),
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(from)?.file_type();
    if file_type.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let child = entry?;
            copy_tree(&child.path(), &to.join(child.file_name()))?;
        }
        Ok(())
    } else if file_type.is_symlink() {
        copy_symlink(from, to)
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target: PathBuf = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

fn remove_path(path: &Path) -> Result<(), InstallError> {
    let is_dir = fs::symlink_metadata(path)
        .map_err(InstallError::io_with("inspect", path))?
        .is_dir();
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(InstallError::io_with("remove", path))
}
