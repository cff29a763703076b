//! Crate-level tests driving the public API end to end.

mod support;

use std::fs;

use kubeplug_config::Paths;
use tempfile::TempDir;
use url::Url;

use crate::test_support::{ArchiveFile, digest, host, zip};
use crate::{HttpFetcher, InstallOptions, Installer, Plugin};

fn manifest_yaml(uri: &str, sha256: &str) -> String {
    format!(
        r#"apiVersion: kubeplug.dev/v1alpha2
kind: Plugin
metadata:
  name: ctx
spec:
  version: v0.4.1
  shortDescription: Switch contexts
  platforms:
    - selector:
        matchExpressions:
          - key: os
            operator: In
            values: [linux, darwin]
      uri: "{uri}"
      sha256: "{sha256}"
      bin: ctx
      files:
        - from: ctx-*/ctx
          to: .
        - from: ctx-*/LICENSE
          to: .
"#
    )
}

#[test]
fn installs_zip_from_file_uri_through_http_fetcher() {
    let temp = TempDir::new().expect("temp dir");
    let archive = zip(&[
        ArchiveFile::executable("ctx-0.4.1/ctx", b"#!/bin/sh\n"),
        ArchiveFile::data("ctx-0.4.1/LICENSE", b"Apache-2.0"),
        ArchiveFile::data("ctx-0.4.1/docs/usage.md", b"usage"),
    ]);
    let archive_path = temp.path().join("ctx.zip");
    fs::write(&archive_path, &archive).expect("write archive");
    let uri = Url::from_file_path(&archive_path).expect("file url");

    let plugin = Plugin::from_yaml(&manifest_yaml(uri.as_str(), &digest(&archive)))
        .expect("manifest should decode");
    let paths = Paths::new(temp.path().join("root"));
    let installer = Installer::new(paths.clone(), host(), HttpFetcher::new());
    installer
        .install(&plugin, &InstallOptions::default())
        .expect("install should succeed");

    let version_dir = paths.plugin_version_install_dir("ctx", "v0.4.1");
    assert!(version_dir.join("ctx").is_file());
    assert!(version_dir.join("LICENSE").is_file());
    assert!(!version_dir.join("docs").exists());
    assert_eq!(
        fs::read_link(paths.bin_dir().join("kubectl-ctx")).expect("link"),
        version_dir.join("ctx")
    );

    let listed = installer.installed_plugins().expect("list");
    assert_eq!(listed, vec![plugin]);

    installer.uninstall("ctx").expect("uninstall");
    assert!(installer.installed_plugins().expect("list").is_empty());
    assert!(!paths.plugin_install_dir("ctx").exists());
}
