//! Archive and manifest builders shared by unit and behaviour tests.

use std::io::{Cursor, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::download::Sha256Verifier;
use crate::manifest::{FileOperation, LabelSelector, Platform, Plugin};
use crate::platform::HostPlatform;

/// One regular file placed in a test archive.
pub(crate) struct ArchiveFile<'a> {
    pub(crate) path: &'a str,
    pub(crate) contents: &'a [u8],
    pub(crate) mode: u32,
}

impl<'a> ArchiveFile<'a> {
    pub(crate) const fn executable(path: &'a str, contents: &'a [u8]) -> Self {
        Self {
            path,
            contents,
            mode: 0o755,
        }
    }

    pub(crate) const fn data(path: &'a str, contents: &'a [u8]) -> Self {
        Self {
            path,
            contents,
            mode: 0o644,
        }
    }
}

pub(crate) fn tar_gz(files: &[ArchiveFile<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for file in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(file.contents.len() as u64);
        header.set_mode(file.mode);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, file.path, file.contents)
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Builds a gzipped tarball holding one entry whose name and link target
/// are written verbatim, bypassing the builder's own path checks.
pub(crate) fn raw_tar_gz(name: &str, entry_type: tar::EntryType, link: Option<&str>) -> Vec<u8> {
    let mut header = tar::Header::new_old();
    {
        let old = header.as_old_mut();
        old.name
            .get_mut(..name.len())
            .expect("name fits header")
            .copy_from_slice(name.as_bytes());
        if let Some(target) = link {
            old.linkname
                .get_mut(..target.len())
                .expect("link fits header")
                .copy_from_slice(target.as_bytes());
        }
    }
    header.set_entry_type(entry_type);
    header.set_mode(0o644);
    header.set_size(if link.is_some() { 0 } else { 4 });
    header.set_cksum();
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let body: &[u8] = if link.is_some() { b"" } else { b"evil" };
    builder.append(&header, body).expect("append raw entry");
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

pub(crate) fn zip(files: &[ArchiveFile<'_>]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        let options = SimpleFileOptions::default().unix_permissions(file.mode);
        writer.start_file(file.path, options).expect("start zip entry");
        writer.write_all(file.contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub(crate) fn digest(bytes: &[u8]) -> String {
    Sha256Verifier::digest(bytes)
}

pub(crate) fn host() -> HostPlatform {
    HostPlatform::new("linux", "amd64")
}

/// Manifest with one platform matching [`host`].
pub(crate) fn plugin(name: &str, version: &str, uri: &str, sha256: &str, bin: &str) -> Plugin {
    Plugin::new(name, version).with_platform(Platform::new(
        LabelSelector::os_arch("linux", "amd64"),
        uri,
        sha256,
        bin,
    ))
}

/// Same as [`plugin`] with explicit file operations.
pub(crate) fn plugin_with_files(
    name: &str,
    version: &str,
    sha256: &str,
    bin: &str,
    files: Vec<FileOperation>,
) -> Plugin {
    Plugin::new(name, version).with_platform(
        Platform::new(
            LabelSelector::os_arch("linux", "amd64"),
            format!("https://example.com/{name}.tar.gz"),
            sha256,
            bin,
        )
        .with_files(files),
    )
}
