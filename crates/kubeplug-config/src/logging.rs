//! Output layouts for lifecycle log events.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How lifecycle events are written to standard error.
///
/// Names are lower case in files and the environment; command-line text is
/// matched without regard to case.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, with fields flattened to the top level.
    Json,
    /// One line per event for an operator's terminal.
    #[default]
    Compact,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    ///
    /// Structured output never carries terminal colour codes.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Error returned when text names no [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
