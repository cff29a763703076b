//! Log output for lifecycle operations.
//!
//! Events go to standard error so listings on standard output stay
//! parseable. [`Config::log_filter`] selects what is emitted and
//! [`Config::log_format`] how it is laid out. The subscriber is a
//! [`Registry`] with the filter layered beneath one formatting layer.

use std::io::{self, IsTerminal};

use kubeplug_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that the process-wide subscriber is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Layout chosen by the first successful initialisation.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error(
        "invalid log filter '{filter}' from KUBEPLUG_LOG_FILTER or --log-filter: {message}"
    )]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls keep the first layout and return its handle.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a different
/// subscriber was installed elsewhere.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED_FORMAT
        .get_or_try_init(|| install_subscriber(config).map(|()| config.log_format()))
        .map(|&format| TelemetryHandle { format })
}

fn lifecycle_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let format = config.log_format();
    let registry = Registry::default().with(lifecycle_filter(config.log_filter())?);
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_ansi(!format.is_structured() && io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let installed = match format {
        LogFormat::Json => set_global_default(registry.with(layer.json().flatten_event(true))),
        LogFormat::Compact => set_global_default(registry.with(layer.compact())),
    };
    installed.map_err(TelemetryError::Subscriber)
}
