//! Fetch, verify and extract plugin archives.
//!
//! The [`Downloader`] reads the full byte stream through a [`Fetcher`],
//! checks it against the manifest digest with [`Sha256Verifier`], and only
//! then unpacks it. Nothing touches the destination directory when the
//! digest disagrees.
//!
//! Two fetchers ship with the crate: [`HttpFetcher`] for manifest URIs and
//! [`FileFetcher`] for local archive overrides. Tests substitute their own
//! implementation of the trait to inject failures.

mod extract;
mod fetch;
mod verify;

use std::path::Path;

use tracing::debug;

use crate::error::InstallError;

pub use self::extract::{ArchiveFormat, extract_archive};
pub use self::fetch::{FileFetcher, HttpFetcher};
pub use self::verify::Sha256Verifier;

/// Retrieves the raw bytes of an archive.
pub trait Fetcher {
    /// Returns every byte available at `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Fetch`] when the bytes cannot be retrieved.
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, InstallError>;

    /// Describes where bytes for `uri` actually come from, for diagnostics.
    fn source_locator(&self, uri: &str) -> String {
        uri.to_owned()
    }
}

/// Runs the fetch, verify, extract sequence for one archive.
pub struct Downloader<'a> {
    fetcher: &'a dyn Fetcher,
    verifier: Sha256Verifier,
}

impl<'a> Downloader<'a> {
    /// Creates a downloader that checks archives against `verifier`.
    #[must_use]
    pub const fn new(fetcher: &'a dyn Fetcher, verifier: Sha256Verifier) -> Self {
        Self { fetcher, verifier }
    }

    /// Fetches `uri`, verifies its digest, and extracts it into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Fetch`], [`InstallError::ChecksumMismatch`],
    /// or [`InstallError::Extract`] naming the source locator.
    pub fn get(&self, uri: &str, dest: &Path) -> Result<(), InstallError> {
        let source_locator = self.fetcher.source_locator(uri);
        let bytes = self.fetcher.fetch(uri)?;
        debug!(source = %source_locator, size = bytes.len(), "fetched archive");
        self.verifier.verify(&bytes, &source_locator)?;
        extract_archive(&bytes, dest, &source_locator)?;
        debug!(source = %source_locator, dest = %dest.display(), "extracted archive");
        Ok(())
    }
}
