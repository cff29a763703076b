//! Fetcher implementations for remote URIs and local overrides.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use url::Url;

use super::Fetcher;
use crate::error::InstallError;

const USER_AGENT: &str = concat!("kubeplug/", env!("CARGO_PKG_VERSION"));

/// Fetches `http`, `https` and `file` URIs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Creates a fetcher with a default blocking agent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }

    /// Creates a fetcher around a preconfigured agent.
    #[must_use]
    pub const fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn fetch_http(&self, uri: &str) -> Result<Vec<u8>, InstallError> {
        let response = self
            .agent
            .get(uri)
            .call()
            .map_err(|error| fetch_error(uri, error.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| fetch_error(uri, error.to_string()))?;
        Ok(bytes)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, InstallError> {
        let url = Url::parse(uri).map_err(|error| fetch_error(uri, error.to_string()))?;
        match url.scheme() {
            "http" | "https" => self.fetch_http(uri),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| fetch_error(uri, "not a local file path"))?;
                read_file(&path, uri)
            }
            other => Err(fetch_error(uri, format!("unsupported scheme '{other}'"))),
        }
    }
}

/// Reads a local archive, ignoring the manifest URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    /// Creates a fetcher reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Archive path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, _uri: &str) -> Result<Vec<u8>, InstallError> {
        read_file(&self.path, &self.path.display().to_string())
    }

    fn source_locator(&self, _uri: &str) -> String {
        self.path.display().to_string()
    }
}

fn read_file(path: &Path, source_locator: &str) -> Result<Vec<u8>, InstallError> {
    fs::read(path).map_err(|error| fetch_error(source_locator, error.to_string()))
}

fn fetch_error(source_locator: &str, message: impl Into<String>) -> InstallError {
    InstallError::Fetch {
        source_locator: source_locator.to_owned(),
        message: message.into(),
    }
}
