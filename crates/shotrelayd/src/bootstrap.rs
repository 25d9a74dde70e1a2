//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use shotrelay_config::{Config, ConfigValidationError, SocketPreparationError};

use crate::broker::Broker;
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but is unusable.
    #[error("invalid configuration: {source}")]
    Validation {
        /// Offending setting.
        #[source]
        source: ConfigValidationError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare control socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    broker: Arc<Broker>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared relay core.
    #[must_use]
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Lifecycle observer.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// Loads and validates configuration, installs telemetry, and prepares the
/// control socket directory. No sockets are bound yet.
///
/// # Errors
///
/// Returns the first [`BootstrapError`] encountered; the reporter sees it too.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match prepare(loader) {
        Ok((config, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            let broker = Arc::new(Broker::from_config(&config));
            Ok(Daemon {
                config,
                broker,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn prepare(loader: &dyn ConfigLoader) -> Result<(Config, TelemetryHandle), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Validation { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .control_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;
    Ok((config, telemetry))
}
