//! Installation engine for kubectl-style plugins.
//!
//! Given a plugin manifest describing downloadable archives per platform,
//! the `kubeplug-install` crate installs, upgrades, and uninstalls a named
//! executable so exactly one version is active and exposed through a link in
//! the shared bin directory.
//!
//! # Architecture
//!
//! An install runs these stages in order, each in its own module:
//!
//! 1. [`receipt`] refuses duplicates: a receipt's presence is the only
//!    definition of "installed".
//! 2. [`platform`] picks the manifest entry matching the host.
//! 3. [`download`] fetches the archive into a fresh staging directory,
//!    verifies its SHA-256, and extracts it.
//! 4. [`relocate`] moves the declared files into the versioned install
//!    directory.
//! 5. [`pathguard`] proves the binary lies inside that directory.
//! 6. [`link`] publishes the binary under its `kubectl-` name.
//! 7. [`receipt`] records the manifest.
//!
//! [`Installer`] sequences the stages and owns the cleanup rules.
//!
//! # Example
//!
//! ```rust,no_run
//! use kubeplug_config::Config;
//! use kubeplug_install::{InstallOptions, Installer, Plugin, telemetry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! telemetry::initialise(&config)?;
//! config.paths().ensure_layout()?;
//!
//! let manifest = std::fs::read_to_string("foo.yaml")?;
//! let plugin = Plugin::from_yaml(&manifest)?;
//! let installer = Installer::from_config(&config).with_locking(true);
//! installer.install(&plugin, &InstallOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod download;
pub mod error;
pub mod installer;
pub mod link;
pub mod lock;
pub mod manifest;
pub mod pathguard;
pub mod platform;
pub mod receipt;
pub mod relocate;
pub mod telemetry;
pub mod version;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use self::download::{Downloader, Fetcher, FileFetcher, HttpFetcher, Sha256Verifier};
pub use self::error::InstallError;
pub use self::installer::{InstallOptions, Installer, MANAGER_PLUGIN_NAME};
pub use self::link::plugin_name_to_bin;
pub use self::manifest::{
    FileOperation, LabelSelector, Platform, Plugin, SelectorOperator, SelectorRequirement,
};
pub use self::platform::HostPlatform;
pub use self::version::PluginVersion;
