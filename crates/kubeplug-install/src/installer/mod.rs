//! Install, upgrade and uninstall orchestration.
//!
//! The [`Installer`] sequences the lifecycle stages. Ordering is what keeps
//! the filesystem consistent:
//!
//! - install writes the receipt only after the versioned directory is
//!   populated and linked;
//! - uninstall removes the link and the directory before the receipt;
//! - upgrade stores the new receipt before the old version is removed.
//!
//! Staging directories are released on every exit path and a failed
//! install removes the versioned directory it populated.
//!
//! The [`Fetcher`] is generic so tests can inject failures without a
//! network. Archive overrides in [`InstallOptions`] bypass it.

mod staging;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kubeplug_config::{Config, Paths};
use tracing::{debug, info, warn};

use self::staging::{InstallDirGuard, StagingArea};
use crate::download::{Downloader, FileFetcher, Fetcher, HttpFetcher, Sha256Verifier};
use crate::error::InstallError;
use crate::link;
use crate::lock::PluginLock;
use crate::manifest::{Platform, Plugin, validate_plugin_name};
use crate::pathguard::ensure_within;
use crate::platform::{HostPlatform, matching_platform};
use crate::receipt;
use crate::relocate::{effective_operations, move_to_install_dir};
use crate::version::PluginVersion;

/// Name under which the plugin manager itself is installed.
pub const MANAGER_PLUGIN_NAME: &str = "kubeplug";

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Per-call options for install and upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    archive_file_override: Option<PathBuf>,
}

impl InstallOptions {
    /// Reads the archive from `path` instead of the manifest URI. The digest
    /// is still verified.
    #[must_use]
    pub fn with_archive_file_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_file_override = Some(path.into());
        self
    }

    /// Local archive used instead of the manifest URI, if any.
    #[must_use]
    pub fn archive_file_override(&self) -> Option<&Path> {
        self.archive_file_override.as_deref()
    }
}

/// Sequences the lifecycle stages over one directory layout.
#[derive(Debug)]
pub struct Installer<F = HttpFetcher> {
    paths: Paths,
    host: HostPlatform,
    fetcher: F,
    locking: bool,
}

impl Installer<HttpFetcher> {
    /// Builds an installer for the configured root and host.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths(), HostPlatform::detect(config), HttpFetcher::new())
    }
}

impl<F> Installer<F> {
    /// Creates an installer with locking disabled.
    #[must_use]
    pub const fn new(paths: Paths, host: HostPlatform, fetcher: F) -> Self {
        Self {
            paths,
            host,
            fetcher,
            locking: false,
        }
    }

    /// Holds a per-plugin lock file across each lifecycle operation.
    #[must_use]
    pub const fn with_locking(mut self, enabled: bool) -> Self {
        self.locking = enabled;
        self
    }

    /// Directory layout the installer operates on.
    #[must_use]
    pub const fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Host labels used for platform matching.
    #[must_use]
    pub const fn host(&self) -> &HostPlatform {
        &self.host
    }
}

impl<F: Fetcher> Installer<F> {
    /// Installs `plugin`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::AlreadyInstalled`] when a receipt exists,
    /// [`InstallError::UnsupportedPlatform`] when no entry matches the
    /// host, and any error raised while staging, relocating, guarding,
    /// linking, or storing the receipt.
    pub fn install(&self, plugin: &Plugin, options: &InstallOptions) -> Result<(), InstallError> {
        plugin.validate()?;
        let name = plugin.name();
        let _lock = self.lock(name)?;

        let receipt_path = self.paths.plugin_receipt_path(name);
        if receipt::load(&receipt_path)?.is_some() {
            return Err(InstallError::AlreadyInstalled {
                name: name.to_owned(),
            });
        }
        let platform = self.select_platform(plugin)?;
        self.reclaim_orphan(name)?;

        let version_dir = self.paths.plugin_version_install_dir(name, plugin.version());
        self.stage_and_link(name, platform, &version_dir, options)?;
        receipt::store(plugin, &receipt_path)?;
        info!(
            target: LIFECYCLE_TARGET,
            plugin = name,
            version = plugin.version(),
            "installed plugin"
        );
        Ok(())
    }

    /// Replaces the installed version of `plugin` with the offered one.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NotInstalled`] without a receipt,
    /// [`InstallError::AlreadyUpgraded`] when the offered version is not
    /// newer, and any error raised by the install stages.
    pub fn upgrade(&self, plugin: &Plugin, options: &InstallOptions) -> Result<(), InstallError> {
        plugin.validate()?;
        let name = plugin.name();
        let _lock = self.lock(name)?;

        let receipt_path = self.paths.plugin_receipt_path(name);
        let installed = receipt::load(&receipt_path)?.ok_or_else(|| InstallError::NotInstalled {
            name: name.to_owned(),
        })?;
        let current = PluginVersion::parse(installed.version())?;
        let offered = PluginVersion::parse(plugin.version())?;
        if offered <= current {
            return Err(InstallError::AlreadyUpgraded {
                name: name.to_owned(),
                version: installed.version().to_owned(),
            });
        }
        let platform = self.select_platform(plugin)?;

        let version_dir = self.paths.plugin_version_install_dir(name, plugin.version());
        self.stage_and_link(name, platform, &version_dir, options)?;
        receipt::store(plugin, &receipt_path)?;

        let old_dir = self.paths.plugin_version_install_dir(name, installed.version());
        if old_dir != version_dir {
            match fs::remove_dir_all(&old_dir) {
                Err(error) if error.kind() != io::ErrorKind::NotFound => {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        plugin = name,
                        dir = %old_dir.display(),
                        error = %error,
                        "failed to remove previous version"
                    );
                }
                _ => {}
            }
        }
        info!(
            target: LIFECYCLE_TARGET,
            plugin = name,
            from = installed.version(),
            to = plugin.version(),
            "upgraded plugin"
        );
        Ok(())
    }

    /// Removes the plugin called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::SelfUninstallNotAllowed`] for the manager's
    /// own name, [`InstallError::NotInstalled`] without a receipt,
    /// [`InstallError::ForeignFileAtLinkPath`] when the link path holds a
    /// non-symlink, and [`InstallError::Io`] when removal fails.
    pub fn uninstall(&self, name: &str) -> Result<(), InstallError> {
        if name == MANAGER_PLUGIN_NAME {
            let base_dir = self.paths.base_dir().to_path_buf();
            if !self.host.is_windows() {
                info!(
                    target: LIFECYCLE_TARGET,
                    "to remove {MANAGER_PLUGIN_NAME}, run: rm -rf -- {}",
                    base_dir.display()
                );
            }
            return Err(InstallError::SelfUninstallNotAllowed {
                name: name.to_owned(),
                base_dir,
            });
        }
        validate_plugin_name(name)?;
        let _lock = self.lock(name)?;

        let receipt_path = self.paths.plugin_receipt_path(name);
        if receipt::load(&receipt_path)?.is_none() {
            self.reclaim_orphan(name)?;
            return Err(InstallError::NotInstalled {
                name: name.to_owned(),
            });
        }

        link::unlink(&link::link_path(self.paths.bin_dir(), name, &self.host))?;
        let plugin_dir = self.paths.plugin_install_dir(name);
        match fs::remove_dir_all(&plugin_dir) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(InstallError::io("remove", &plugin_dir, error)),
        }
        receipt::delete(&receipt_path)?;
        info!(target: LIFECYCLE_TARGET, plugin = name, "uninstalled plugin");
        Ok(())
    }

    /// Lists installed plugins from their receipts, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns the first receipt that cannot be read or decoded.
    pub fn installed_plugins(&self) -> Result<Vec<Plugin>, InstallError> {
        receipt::load_all(self.paths.receipts_dir())
    }

    /// Removes every store entry that has no receipt, together with its
    /// link, and returns the removed names.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Io`] when the store cannot be listed or an
    /// orphan or its link cannot be removed.
    pub fn sweep_orphans(&self) -> Result<Vec<String>, InstallError> {
        let store = self.paths.store_dir();
        let entries = match fs::read_dir(store) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(InstallError::io("list", store, error)),
        };
        let mut removed = Vec::new();
        for item in entries {
            let entry = item.map_err(InstallError::io_with("list", store))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.paths.plugin_receipt_path(&name).exists() {
                continue;
            }
            self.reclaim_orphan_link(&name)?;
            let path = entry.path();
            let result = if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(InstallError::io_with("remove orphan", &path))?;
            info!(target: LIFECYCLE_TARGET, plugin = %name, "removed orphaned install");
            removed.push(name);
        }
        removed.sort();
        Ok(removed)
    }

    fn select_platform<'a>(&self, plugin: &'a Plugin) -> Result<&'a Platform, InstallError> {
        matching_platform(&plugin.spec.platforms, &self.host).ok_or_else(|| {
            InstallError::UnsupportedPlatform {
                name: plugin.name().to_owned(),
                os: self.host.os().to_owned(),
                arch: self.host.arch().to_owned(),
            }
        })
    }

    /// Fetches, relocates, guards and links one platform artifact into
    /// `version_dir`.
    fn stage_and_link(
        &self,
        name: &str,
        platform: &Platform,
        version_dir: &Path,
        options: &InstallOptions,
    ) -> Result<(), InstallError> {
        let staging = StagingArea::create(self.paths.download_dir(), name)?;
        debug!(
            target: LIFECYCLE_TARGET,
            plugin = name,
            staging = %staging.path().display(),
            "created staging directory"
        );
        let local = options.archive_file_override().map(FileFetcher::new);
        let fetcher = local
            .as_ref()
            .map_or(&self.fetcher as &dyn Fetcher, |file| file as &dyn Fetcher);
        Downloader::new(fetcher, Sha256Verifier::new(platform.sha256.as_str()))
            .get(&platform.uri, staging.path())?;

        let guard = InstallDirGuard::new(version_dir);
        move_to_install_dir(
            staging.path(),
            version_dir,
            &effective_operations(&platform.files),
        )?;
        let binary = ensure_within(version_dir, &version_dir.join(&platform.bin))?;
        link::publish(self.paths.bin_dir(), &binary, name, &self.host)?;
        guard.commit();
        Ok(())
    }

    /// Removes install content and its link left behind without a receipt.
    fn reclaim_orphan(&self, name: &str) -> Result<(), InstallError> {
        self.reclaim_orphan_link(name)?;
        let plugin_dir = self.paths.plugin_install_dir(name);
        match fs::remove_dir_all(&plugin_dir) {
            Ok(()) => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    plugin = name,
                    dir = %plugin_dir.display(),
                    "removed orphaned install directory"
                );
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(InstallError::io("remove orphaned", &plugin_dir, error)),
        }
    }

    /// Removes the plugin's link when it is a symlink. A regular file at the
    /// link path belongs to the user and stays.
    fn reclaim_orphan_link(&self, name: &str) -> Result<(), InstallError> {
        let link_path = link::link_path(self.paths.bin_dir(), name, &self.host);
        let is_symlink = fs::symlink_metadata(&link_path)
            .is_ok_and(|metadata| metadata.file_type().is_symlink());
        if is_symlink {
            link::unlink(&link_path)?;
            warn!(
                target: LIFECYCLE_TARGET,
                plugin = name,
                link = %link_path.display(),
                "removed orphaned link"
            );
        }
        Ok(())
    }

    fn lock(&self, name: &str) -> Result<Option<PluginLock>, InstallError> {
        if self.locking {
            PluginLock::acquire(name, &self.paths.plugin_lock_path(name)).map(Some)
        } else {
            Ok(None)
        }
    }
}
