//! Shared world for behaviour scenarios.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use kubeplug_config::Paths;
use rstest::fixture;
use tempfile::TempDir;

use crate::download::FileFetcher;
use crate::error::InstallError;
use crate::installer::{InstallOptions, Installer};
use crate::link;
use crate::manifest::Plugin;
use crate::test_support::{ArchiveFile, digest, host, plugin, tar_gz};

/// Scenario state: an isolated root plus the archive the fetcher serves.
pub(super) struct TestWorld {
    _temp: TempDir,
    pub(super) paths: Paths,
    archive_path: PathBuf,
    pub(super) plugin: Option<Plugin>,
    pub(super) outcome: Option<Result<(), InstallError>>,
}

impl Default for TestWorld {
    fn default() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let paths = Paths::new(temp.path().join("root"));
        paths.ensure_layout().expect("layout");
        let archive_path = temp.path().join("release.tar.gz");
        Self {
            _temp: temp,
            paths,
            archive_path,
            plugin: None,
            outcome: None,
        }
    }
}

impl TestWorld {
    /// Publishes an archive holding `bin` and returns a manifest for it.
    pub(super) fn publish(&mut self, name: &str, version: &str, bin: &str) -> Plugin {
        let contents = format!("#!/bin/sh\necho {name} {version}\n");
        let archive = tar_gz(&[ArchiveFile::executable(bin, contents.as_bytes())]);
        fs::write(&self.archive_path, &archive).expect("write archive");
        let manifest = plugin(
            name,
            version,
            &format!("https://example.com/{name}-{version}.tar.gz"),
            &digest(&archive),
            bin,
        );
        self.plugin = Some(manifest.clone());
        manifest
    }

    pub(super) fn installer(&self) -> Installer<FileFetcher> {
        Installer::new(
            self.paths.clone(),
            host(),
            FileFetcher::new(&self.archive_path),
        )
        .with_locking(true)
    }

    pub(super) fn plugin(&self) -> &Plugin {
        self.plugin.as_ref().expect("a plugin should be published")
    }

    pub(super) fn install(&mut self) {
        let outcome = self
            .installer()
            .install(self.plugin(), &InstallOptions::default());
        self.outcome = Some(outcome);
    }

    pub(super) fn upgrade(&mut self) {
        let outcome = self
            .installer()
            .upgrade(self.plugin(), &InstallOptions::default());
        self.outcome = Some(outcome);
    }

    pub(super) fn uninstall(&mut self, name: &str) {
        self.outcome = Some(self.installer().uninstall(name));
    }

    pub(super) fn outcome(&self) -> &Result<(), InstallError> {
        self.outcome.as_ref().expect("an operation should have run")
    }

    pub(super) fn bin_path(&self, file_name: &str) -> PathBuf {
        self.paths.bin_dir().join(file_name)
    }

    pub(super) fn link_for(&self, name: &str) -> PathBuf {
        link::link_path(self.paths.bin_dir(), name, &host())
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
