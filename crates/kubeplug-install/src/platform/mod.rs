//! Selects the platform entry that fits the host.
//!
//! The host is described by the `os` and `arch` labels manifests select on.
//! Labels use Go-style names (`darwin`, `amd64`, `arm64`), so Rust's target
//! constants are translated. Either label can be forced through
//! configuration for tests and cross-target installs.

use std::collections::BTreeMap;
use std::env::consts;

use kubeplug_config::Config;
use tracing::debug;

use crate::manifest::Platform;

/// Label key carrying the operating system.
pub const OS_LABEL: &str = "os";
/// Label key carrying the CPU architecture.
pub const ARCH_LABEL: &str = "arch";

/// OS and architecture labels used for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    os: String,
    arch: String,
}

impl HostPlatform {
    /// Creates a host description from explicit labels.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Describes the running host, honouring configured overrides.
    #[must_use]
    pub fn detect(config: &Config) -> Self {
        let os = config
            .os_override()
            .map_or_else(|| go_os(consts::OS), str::to_owned);
        let arch = config
            .arch_override()
            .map_or_else(|| go_arch(consts::ARCH), str::to_owned);
        Self { os, arch }
    }

    /// OS label.
    #[must_use]
    pub const fn os(&self) -> &str {
        self.os.as_str()
    }

    /// Architecture label.
    #[must_use]
    pub const fn arch(&self) -> &str {
        self.arch.as_str()
    }

    /// Returns `true` when binaries for this host need the `.exe` suffix.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Labels a selector is evaluated against.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (String::from(OS_LABEL), self.os.clone()),
            (String::from(ARCH_LABEL), self.arch.clone()),
        ])
    }
}

/// Returns the first entry whose selector matches `host`.
///
/// Entries without a selector never match.
#[must_use]
pub fn matching_platform<'a>(platforms: &'a [Platform], host: &HostPlatform) -> Option<&'a Platform> {
    let labels = host.labels();
    let found = platforms.iter().find(|platform| {
        platform
            .selector
            .as_ref()
            .is_some_and(|selector| selector.matches(&labels))
    });
    debug!(
        os = host.os(),
        arch = host.arch(),
        candidates = platforms.len(),
        matched = found.is_some(),
        "matched platform"
    );
    found
}

fn go_os(os: &str) -> String {
    match os {
        "macos" => String::from("darwin"),
        other => other.to_owned(),
    }
}

fn go_arch(arch: &str) -> String {
    match arch {
        "x86_64" => String::from("amd64"),
        "aarch64" => String::from("arm64"),
        "x86" => String::from("386"),
        "powerpc64" if cfg!(target_endian = "little") => String::from("ppc64le"),
        "powerpc64" => String::from("ppc64"),
        other => other.to_owned(),
    }
}
