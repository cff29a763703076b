use std::path::{Path, PathBuf};

/// Name of the directory created under the user's home when no root is set.
pub const DEFAULT_ROOT_DIR_NAME: &str = ".kubeplug";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned default filter for serde defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::default()
}

/// Computes the default root directory beneath the given home directory.
#[must_use]
pub fn default_root(home: &Path) -> PathBuf {
    home.join(DEFAULT_ROOT_DIR_NAME)
}
