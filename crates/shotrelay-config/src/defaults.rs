use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketEndpoint;

/// Interface agents connect to unless overridden.
pub const DEFAULT_AGENT_HOST: &str = "0.0.0.0";

/// Port of the agent WebSocket listener.
pub const DEFAULT_AGENT_PORT: u16 = 8765;

/// Label used by the CLI when reporting capture results.
pub const DEFAULT_COMMAND_PREFIX: &str = "screenshot";

/// Number of agents admitted at once.
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Milliseconds a capture may stay unanswered.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 30_000;

/// Milliseconds between timeout sweeps.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;

/// TCP port of the control socket on platforms without Unix sockets.
pub const DEFAULT_CONTROL_TCP_PORT: u16 = 9765;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned agent host used where allocation is required (e.g. serde).
pub fn default_agent_host() -> String {
    DEFAULT_AGENT_HOST.to_owned()
}

/// Owned command prefix.
pub fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_owned()
}

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value.
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default control socket endpoint.
pub fn default_control_socket() -> SocketEndpoint {
    default_control_socket_inner()
}

#[cfg(unix)]
fn default_control_socket_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("shotrelay");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("shotrelayd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_control_socket_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_CONTROL_TCP_PORT)
}
