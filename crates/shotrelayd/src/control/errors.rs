//! Errors raised while serving a control connection.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading, parsing, or answering a control request.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The request line was not a valid control request.
    #[error("malformed request: {message}")]
    Malformed {
        /// Parser explanation.
        message: String,
        /// JSON error, when there was one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// The request line exceeded the size limit.
    #[error("request too large: exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Limit in bytes.
        max_size: usize,
    },
    /// Reading or writing the socket failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// A response could not be serialised.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ControlError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn from_json_error(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }
}
