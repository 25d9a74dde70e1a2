//! Control socket connection for the CLI.
//!
//! A capture blocks until an agent answers or the daemon sweeps the request,
//! so reads wait for the configured response timeout plus [`RESPONSE_GRACE`]
//! before the CLI gives up on the daemon.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use shotrelay_config::{Config, SocketEndpoint};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use super::AppError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_GRACE: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open stream to the daemon's control socket.
pub(super) enum ControlStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ControlStream {
    /// Connects to the configured control socket and applies IO timeouts.
    pub(super) fn open(config: &Config) -> Result<Self, AppError> {
        let endpoint = config.control_socket();
        let stream = Self::connect(endpoint)?;
        stream
            .set_timeouts(read_timeout(config))
            .map_err(|source| connect_failure(endpoint, source))?;
        Ok(stream)
    }

    fn connect(endpoint: &SocketEndpoint) -> Result<Self, AppError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                let address = resolve(host, *port).map_err(|source| AppError::Resolve {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                TcpStream::connect_timeout(&address, CONNECT_TIMEOUT)
                    .map(Self::Tcp)
                    .map_err(|source| connect_failure(endpoint, source))
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                connect_unix(path.as_str()).map_err(|source| connect_failure(endpoint, source))
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                Err(AppError::UnsupportedUnixTransport(endpoint.to_string()))
            }
        }
    }

    fn set_timeouts(&self, read: Duration) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => {
                stream.set_read_timeout(Some(read))?;
                stream.set_write_timeout(Some(WRITE_TIMEOUT))
            }
            #[cfg(unix)]
            Self::Unix(stream) => {
                stream.set_read_timeout(Some(read))?;
                stream.set_write_timeout(Some(WRITE_TIMEOUT))
            }
        }
    }
}

impl Read for ControlStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ControlStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// How long to wait for the daemon's next line.
pub(super) fn read_timeout(config: &Config) -> Duration {
    config.response_timeout().saturating_add(RESPONSE_GRACE)
}

fn connect_failure(endpoint: &SocketEndpoint, source: io::Error) -> AppError {
    let endpoint = endpoint.to_string();
    match source.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
            AppError::DaemonUnavailable { endpoint }
        }
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => AppError::ConnectTimeout {
            endpoint,
            after: CONNECT_TIMEOUT,
        },
        _ => AppError::Connect { endpoint, source },
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses")
    })
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<ControlStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.connect_timeout(&SockAddr::unix(path)?, CONNECT_TIMEOUT)?;
    Ok(ControlStream::Unix(std::os::fd::OwnedFd::from(socket).into()))
}
