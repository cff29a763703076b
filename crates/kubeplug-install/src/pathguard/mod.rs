//! Containment checks for paths derived from untrusted manifests and
//! archives.
//!
//! [`ensure_within`] is the guard run before a binary is linked: the
//! candidate must sit under the install directory both lexically and, when
//! it exists, after symlinks are resolved.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::InstallError;

/// Resolves `.` and `..` components without touching the filesystem.
///
/// Returns `None` when a `..` would climb above the first component of a
/// relative path or above the root of an absolute one.
#[must_use]
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth = 0_usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1)?;
                normalized.pop();
            }
            Component::Normal(part) => {
                depth += 1;
                normalized.push(part);
            }
        }
    }
    Some(normalized)
}

/// Returns `true` when `candidate` equals `root` or lies beneath it, after
/// lexical normalisation of both.
#[must_use]
pub fn is_sub_path(root: &Path, candidate: &Path) -> bool {
    match (normalize_lexically(root), normalize_lexically(candidate)) {
        (Some(normal_root), Some(normal_candidate)) => normal_candidate.starts_with(&normal_root),
        _ => false,
    }
}

/// Proves `candidate` is contained in `root` and returns its normalised
/// form.
///
/// The lexical check always runs. When `candidate` exists, both paths are
/// also canonicalised so a symlink inside the tree cannot point outside it.
/// A missing candidate passes; the caller reports it when linking.
///
/// # Errors
///
/// Returns [`InstallError::PathTraversal`] when the candidate escapes, and
/// [`InstallError::Io`] when either path cannot be resolved for a reason
/// other than the candidate being absent.
pub fn ensure_within(root: &Path, candidate: &Path) -> Result<PathBuf, InstallError> {
    let traversal = || InstallError::PathTraversal {
        path: candidate.to_path_buf(),
        root: root.to_path_buf(),
    };
    if !candidate.is_absolute() || !is_sub_path(root, candidate) {
        return Err(traversal());
    }
    let normalized = normalize_lexically(candidate).ok_or_else(traversal)?;

    let resolved = match normalized.canonicalize() {
        Ok(resolved) => resolved,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(normalized),
        Err(error) => return Err(InstallError::io("resolve", &normalized, error)),
    };
    let resolved_root = root
        .canonicalize()
        .map_err(InstallError::io_with("resolve", root))?;
    if resolved.starts_with(&resolved_root) {
        Ok(normalized)
    } else {
        Err(traversal())
    }
}
