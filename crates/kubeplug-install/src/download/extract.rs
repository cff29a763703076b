//! Archive extraction with entry-path sanitisation.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::InstallError;
use crate::pathguard::normalize_lexically;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = b"\x1f\x8b";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Archive formats recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP archive.
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
    /// Uncompressed POSIX tarball.
    Tar,
}

impl ArchiveFormat {
    /// Detects the format from magic bytes.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(ZIP_MAGIC) {
            Some(Self::Zip)
        } else if bytes.starts_with(GZIP_MAGIC) {
            Some(Self::TarGz)
        } else if bytes
            .get(TAR_MAGIC_OFFSET..)
            .is_some_and(|tail| tail.starts_with(TAR_MAGIC))
        {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Extracts `bytes` into `dest`.
///
/// Entries with absolute paths or `..` components, and symlinks pointing
/// outside the archive, abort extraction. Unix permission bits are kept.
///
/// # Errors
///
/// Returns [`InstallError::Extract`] for unreadable or unsafe archives and
/// [`InstallError::Io`] when writing into `dest` fails.
pub fn extract_archive(bytes: &[u8], dest: &Path, source_locator: &str) -> Result<(), InstallError> {
    let format = ArchiveFormat::detect(bytes)
        .ok_or_else(|| extract_error(source_locator, "unrecognised archive format"))?;
    match format {
        ArchiveFormat::Zip => extract_zip(bytes, dest, source_locator),
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(bytes), dest, source_locator),
        ArchiveFormat::Tar => extract_tar(bytes, dest, source_locator),
    }
}

fn extract_tar(reader: impl Read, dest: &Path, source_locator: &str) -> Result<(), InstallError> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|error| extract_error(source_locator, error.to_string()))?;
    for item in entries {
        let mut entry = item.map_err(|error| extract_error(source_locator, error.to_string()))?;
        let raw = entry
            .path()
            .map_err(|error| extract_error(source_locator, error.to_string()))?
            .into_owned();
        let Some(relative) = sanitize_entry_path(&raw, source_locator)? else {
            continue;
        };
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|error| extract_error(source_locator, error.to_string()))?
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_default();
            check_link_target(&relative, &target, entry_type.is_hard_link(), source_locator)?;
        }
        entry
            .unpack_in(dest)
            .map_err(|error| extract_error(source_locator, format!("{}: {error}", raw.display())))?;
    }
    Ok(())
}

fn extract_zip(bytes: &[u8], dest: &Path, source_locator: &str) -> Result<(), InstallError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| extract_error(source_locator, error.to_string()))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|error| extract_error(source_locator, error.to_string()))?;
        let raw = entry.name().replace('\\', "/");
        let Some(relative) = sanitize_entry_path(Path::new(&raw), source_locator)? else {
            continue;
        };
        let out = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(InstallError::io_with("create directory", &out))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(InstallError::io_with("create directory", parent))?;
        }
        let mut file = File::create(&out).map_err(InstallError::io_with("create file", &out))?;
        io::copy(&mut entry, &mut file)
            .map_err(|error| extract_error(source_locator, format!("{raw}: {error}")))?;
        apply_mode(&out, entry.unix_mode())?;
    }
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = mode else {
        return Ok(());
    };
    fs::set_permissions(path, fs::Permissions::from_mode(bits & 0o777))
        .map_err(InstallError::io_with("set permissions on", path))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<(), InstallError> {
    Ok(())
}

/// Returns the entry path relative to the archive root, or `None` for the
/// root itself.
fn sanitize_entry_path(raw: &Path, source_locator: &str) -> Result<Option<PathBuf>, InstallError> {
    let mut cleaned = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(extract_error(
                    source_locator,
                    format!("entry '{}' escapes the destination", raw.display()),
                ));
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    Ok((!cleaned.as_os_str().is_empty()).then_some(cleaned))
}

fn check_link_target(
    entry: &Path,
    target: &Path,
    hard_link: bool,
    source_locator: &str,
) -> Result<(), InstallError> {
    let base = if hard_link {
        Path::new("")
    } else {
        entry.parent().unwrap_or_else(|| Path::new(""))
    };
    if target.is_absolute() || normalize_lexically(&base.join(target)).is_none() {
        return Err(extract_error(
            source_locator,
            format!(
                "link '{}' points outside the archive at '{}'",
                entry.display(),
                target.display()
            ),
        ));
    }
    Ok(())
}

fn extract_error(source_locator: &str, message: impl Into<String>) -> InstallError {
    InstallError::Extract {
        source_locator: source_locator.to_owned(),
        message: message.into(),
    }
}
