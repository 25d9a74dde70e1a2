//! Shared configuration for the shotrelay broker and its operator CLI.
//!
//! Both binaries load the same [`Config`] through `ortho_config`, layering
//! built-in defaults, an optional configuration file, `SHOTRELAY_*`
//! environment variables, and command-line flags (in increasing precedence).
//! The daemon reads the agent listener, admission, and timeout settings; the
//! CLI only needs the control socket and the cosmetic command prefix.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_AGENT_HOST, DEFAULT_AGENT_PORT, DEFAULT_COMMAND_PREFIX, DEFAULT_CONTROL_TCP_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_CLIENTS, DEFAULT_RESPONSE_TIMEOUT_MS,
    DEFAULT_SWEEP_INTERVAL_MS, default_agent_host, default_command_prefix,
    default_control_socket, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by `shotrelayd` and `shotrelay`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SHOTRELAY")]
pub struct Config {
    /// Interface the agent WebSocket listener binds.
    #[ortho_config(default = default_agent_host())]
    pub agent_host: String,
    /// TCP port the agent WebSocket listener binds.
    #[ortho_config(default = DEFAULT_AGENT_PORT)]
    pub agent_port: u16,
    /// Shared secret agents must present in their `auth` frame.
    #[ortho_config(default = String::new())]
    pub auth_token: String,
    /// Label the operator front end uses for capture output.
    #[ortho_config(default = default_command_prefix())]
    pub command_prefix: String,
    /// Maximum number of simultaneously authenticated agents.
    #[ortho_config(default = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,
    /// Age in milliseconds after which an unanswered capture times out.
    #[ortho_config(default = DEFAULT_RESPONSE_TIMEOUT_MS)]
    pub response_timeout_ms: u64,
    /// Interval in milliseconds between timeout sweeps.
    #[ortho_config(default = DEFAULT_SWEEP_INTERVAL_MS)]
    pub sweep_interval_ms: u64,
    /// Endpoint of the operator control socket.
    #[ortho_config(default = default_control_socket())]
    pub control_socket: SocketEndpoint,
    /// `tracing` filter expression applied by the daemon.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format of daemon logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_host: default_agent_host(),
            agent_port: DEFAULT_AGENT_PORT,
            auth_token: String::new(),
            command_prefix: default_command_prefix(),
            max_clients: DEFAULT_MAX_CLIENTS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            control_socket: default_control_socket(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint agents connect to.
    #[must_use]
    pub fn agent_endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::tcp(self.agent_host.clone(), self.agent_port)
    }

    /// Shared agent secret.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Cosmetic command label.
    #[must_use]
    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Admission cap for authenticated agents.
    #[must_use]
    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Timeout applied to pending capture requests.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Interval between timeout sweeps.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Operator control socket.
    #[must_use]
    pub fn control_socket(&self) -> &SocketEndpoint {
        &self.control_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Checks the settings the daemon cannot run without.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.auth_token.trim().is_empty() {
            return Err(ConfigValidationError::MissingAuthToken);
        }
        if self.auth_token.contains(':') {
            return Err(ConfigValidationError::DelimiterInAuthToken);
        }
        if self.max_clients == 0 {
            return Err(ConfigValidationError::ZeroMaxClients);
        }
        if self.response_timeout_ms == 0 {
            return Err(ConfigValidationError::ZeroDuration {
                field: "response_timeout_ms",
            });
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigValidationError::ZeroDuration {
                field: "sweep_interval_ms",
            });
        }
        Ok(())
    }
}

/// Semantic errors in an otherwise well-formed configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// No shared agent secret was configured.
    #[error("auth_token must be set to a non-empty secret")]
    MissingAuthToken,
    /// The secret would be split by the colon-delimited wire format.
    #[error("auth_token must not contain ':'")]
    DelimiterInAuthToken,
    /// An admission cap of zero would reject every agent.
    #[error("max_clients must be at least 1")]
    ZeroMaxClients,
    /// A timing field was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending field.
        field: &'static str,
    },
}
