//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use shotrelay_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a listener accepts connections.
    fn listener_ready(&self, name: &str, endpoint: &SocketEndpoint);

    /// Invoked after every listener and the sweeper have stopped.
    fn shutdown_completed(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_ready(&self, name: &str, endpoint: &SocketEndpoint) {
        (**self).listener_ready(name, endpoint);
    }

    fn shutdown_completed(&self) {
        (**self).shutdown_completed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            agent_endpoint = %config.agent_endpoint(),
            control_socket = %config.control_socket(),
            max_clients = config.max_clients(),
            response_timeout_ms = config.response_timeout().as_millis(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listener_ready(&self, name: &str, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            listener = name,
            endpoint = %endpoint,
            "listener ready"
        );
    }

    fn shutdown_completed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            "daemon stopped"
        );
    }
}
