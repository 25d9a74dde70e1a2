use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats accepted by `--log-format`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

/// Error returned when `--log-format` names an unknown format.
pub type LogFormatParseError = strum::ParseError;
