//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve { endpoint: String, source: io::Error },
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[error("failed to connect to daemon at {endpoint}: nothing is listening, is shotrelayd running?")]
    DaemonUnavailable { endpoint: String },
    #[error("failed to connect to daemon at {endpoint}: no answer within {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    #[error("failed to serialise control request: {0}")]
    SerialiseRequest(serde_json::Error),
    #[error("failed to send request to daemon: {0}")]
    SendRequest(io::Error),
    #[error("failed to read response from daemon: {0}")]
    ReadResponse(io::Error),
    #[error("daemon sent nothing for {0:?}")]
    ResponseTimeout(Duration),
    #[error("failed to parse daemon message: {0}")]
    ParseMessage(serde_json::Error),
    #[error("failed to forward daemon output: {0}")]
    ForwardResponse(io::Error),
    #[error("daemon closed the stream without sending an exit status")]
    MissingExit,
    #[error("agent sent an image that is not valid base64: {0}")]
    DecodeImage(base64::DecodeError),
    #[error("failed to write image to {}: {source}", path.display())]
    WriteImage { path: PathBuf, source: io::Error },
}

impl AppError {
    /// Maps a failed read on the control stream, separating an expired read
    /// timeout from other IO errors.
    pub(crate) fn from_read(error: io::Error, waited: Duration) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::ResponseTimeout(waited),
            _ => Self::ReadResponse(error),
        }
    }
}
