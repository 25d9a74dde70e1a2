use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Address a shotrelay listener binds or a client connects to.
///
/// Written as `unix:///run/shotrelay/shotrelayd.sock` or `tcp://host:port` on
/// the command line; configuration files use the tagged table form
/// `{ transport = "tcp", host = "0.0.0.0", port = 8765 }`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Filesystem socket, used for the operator control channel.
    Unix {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// TCP address.
    Tcp {
        /// Host name or interface address.
        host: String,
        /// Port number.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Socket path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// `host:port` form suitable for `TcpListener::bind`.
    #[must_use]
    pub fn tcp_authority(&self) -> Option<String> {
        match self {
            Self::Tcp { host, port } => Some(format!("{host}:{port}")),
            Self::Unix { .. } => None,
        }
    }

    /// Creates the parent directory of a Unix socket with owner-only access.
    ///
    /// TCP endpoints need no preparation.
    ///
    /// # Errors
    ///
    /// Returns [`SocketPreparationError`] when the path has no parent or the
    /// directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            })?;

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        match builder.create(parent.as_std_path()) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => match url.path() {
                "" | "/" => Err(SocketParseError::MissingUnixPath(input.to_owned())),
                path => Ok(Self::unix(path)),
            },
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host, port))
            }
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was neither `unix` nor `tcp`.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// TCP host was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// Input was not a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Offending socket path.
        path: Utf8PathBuf,
    },
    /// The parent directory could not be created.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}
