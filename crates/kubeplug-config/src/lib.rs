//! Shared configuration for the kubeplug plugin manager.
//!
//! [`Config`] derives [`OrthoConfig`], so values are layered from the
//! built-in defaults, a `.kubeplug.toml` file, `KUBEPLUG_`-prefixed
//! environment variables, and command-line flags, in increasing precedence.
//!
//! | Variable              | Flag           | Meaning                                 |
//! |-----------------------|----------------|-----------------------------------------|
//! | `KUBEPLUG_ROOT`       | `--root`       | base directory for all managed state    |
//! | `KUBEPLUG_OS`         | `--os`         | forces the OS label used for matching   |
//! | `KUBEPLUG_ARCH`       | `--arch`       | forces the arch label used for matching |
//! | `KUBEPLUG_LOG_FILTER` | `--log-filter` | `tracing` filter expression             |
//! | `KUBEPLUG_LOG_FORMAT` | `--log-format` | `json` or `compact`                     |
//!
//! Loaded values pass through [`Config::resolve`], which fills in the root
//! beneath the home directory, drops blank overrides, and rejects relative
//! roots.

mod defaults;
mod logging;
mod paths;

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_ROOT_DIR_NAME, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{Paths, PathsError};

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "KUBEPLUG";
/// Variable overriding the root directory.
pub const ROOT_ENV: &str = "KUBEPLUG_ROOT";
/// Variable forcing the OS label used by platform matching.
pub const OS_ENV: &str = "KUBEPLUG_OS";
/// Variable forcing the architecture label used by platform matching.
pub const ARCH_ENV: &str = "KUBEPLUG_ARCH";
/// Variable holding the log filter expression.
pub const LOG_FILTER_ENV: &str = "KUBEPLUG_LOG_FILTER";
/// Variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "KUBEPLUG_LOG_FORMAT";

const PROGRAM_NAME: &str = "kubeplug";

/// Resolved configuration for lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "KUBEPLUG")]
pub struct Config {
    /// Root directory holding all managed state. Empty until resolved.
    #[serde(default)]
    root: Utf8PathBuf,
    /// OS label override.
    #[serde(default)]
    os: Option<String>,
    /// Architecture label override.
    #[serde(default)]
    arch: Option<String>,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    log_format: LogFormat,
}

impl Config {
    /// Builds a configuration rooted at `root` with default logging and no
    /// platform overrides.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            os: None,
            arch: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }

    /// Loads configuration from files and the process environment, ignoring
    /// the process arguments.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_args`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_from_args([OsString::from(PROGRAM_NAME)])
    }

    /// Loads configuration with `args` as the command line, the first
    /// element being the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer fails to parse or merge,
    /// and any error raised by [`Config::resolve`].
    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::load_from_iter(args)
            .map_err(ConfigError::Load)?
            .resolve(dirs::home_dir())
    }

    /// Finalises loaded values.
    ///
    /// Blank values count as unset. An unset root becomes
    /// [`DEFAULT_ROOT_DIR_NAME`] beneath `home`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHome`] when no root is set and `home`
    /// is `None`, [`ConfigError::NonUtf8`] when the home directory is not
    /// UTF-8, and [`ConfigError::RelativeRoot`] when the root is relative.
    pub fn resolve(mut self, home: Option<PathBuf>) -> Result<Self, ConfigError> {
        self.os = non_blank(self.os.take());
        self.arch = non_blank(self.arch.take());
        if self.log_filter.trim().is_empty() {
            self.log_filter = default_log_filter_string();
        }

        let trimmed = self.root.as_str().trim().to_owned();
        self.root = if trimmed.is_empty() {
            let home_dir = home.ok_or(ConfigError::MissingHome)?;
            Utf8PathBuf::from_path_buf(defaults::default_root(&home_dir))
                .map_err(|_| ConfigError::NonUtf8 { variable: "HOME" })?
        } else {
            Utf8PathBuf::from(trimmed)
        };
        if !self.root.is_absolute() {
            return Err(ConfigError::RelativeRoot {
                root: self.root.into_string(),
            });
        }
        Ok(self)
    }

    /// Forces the OS label used by platform matching.
    #[must_use]
    pub fn with_os_override(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Forces the architecture label used by platform matching.
    #[must_use]
    pub fn with_arch_override(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Replaces the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Root directory holding all managed state.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.root.as_path()
    }

    /// OS label override, if any.
    #[must_use]
    pub fn os_override(&self) -> Option<&str> {
        self.os.as_deref()
    }

    /// Architecture label override, if any.
    #[must_use]
    pub fn arch_override(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    /// Log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Derives the on-disk layout beneath the configured root.
    #[must_use]
    pub fn paths(&self) -> Paths {
        Paths::new(self.root.as_std_path())
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration layer failed to load or merge.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// No root was configured and the home directory is unknown.
    #[error("cannot determine home directory; set {ROOT_ENV}")]
    MissingHome,
    /// A path held bytes that are not valid UTF-8.
    #[error("{variable} is not valid UTF-8")]
    NonUtf8 {
        /// Source of the offending value.
        variable: &'static str,
    },
    /// The root directory must be absolute.
    #[error("root directory '{root}' must be an absolute path")]
    RelativeRoot {
        /// Offending root.
        root: String,
    },
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}
