//! Running listeners and the sweeper for one bootstrapped daemon.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::bootstrap::Daemon;
use crate::control::ControlConnectionHandler;
use crate::health::HealthReporter;
use crate::process::LaunchError;
use crate::sweeper::SweeperHandle;
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");
const AGENT_LISTENER: &str = "agent";
const CONTROL_LISTENER: &str = "control";

/// Background threads serving one daemon.
pub struct Runtime {
    agent: ListenerHandle,
    control: ListenerHandle,
    sweeper: SweeperHandle,
    agent_addr: Option<SocketAddr>,
    control_addr: Option<SocketAddr>,
    reporter: Arc<dyn HealthReporter>,
}

impl Runtime {
    /// Binds both listeners and starts the sweeper.
    ///
    /// Nothing is started unless both endpoints bind.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when an endpoint cannot be bound.
    pub fn start(daemon: &Daemon) -> Result<Self, ListenerError> {
        let config = daemon.config();
        let broker = daemon.broker();
        let reporter = Arc::clone(daemon.reporter());

        let agent_endpoint = config.agent_endpoint();
        let agent_listener = SocketListener::bind(AGENT_LISTENER, &agent_endpoint)?;
        let control_listener = SocketListener::bind(CONTROL_LISTENER, config.control_socket())?;
        let agent_addr = agent_listener.local_addr();
        let control_addr = control_listener.local_addr();

        let agent = agent_listener.start(Arc::new(broker.agent_handler()))?;
        reporter.listener_ready(AGENT_LISTENER, &agent_endpoint);
        let control =
            control_listener.start(Arc::new(ControlConnectionHandler::new(Arc::clone(broker))))?;
        reporter.listener_ready(CONTROL_LISTENER, config.control_socket());
        let sweeper = broker.sweeper().spawn(config.sweep_interval());

        Ok(Self {
            agent,
            control,
            sweeper,
            agent_addr,
            control_addr,
            reporter,
        })
    }

    /// Bound agent address, useful when the configured port was 0.
    #[must_use]
    pub const fn agent_addr(&self) -> Option<SocketAddr> {
        self.agent_addr
    }

    /// Bound control address when the control socket is TCP.
    #[must_use]
    pub const fn control_addr(&self) -> Option<SocketAddr> {
        self.control_addr
    }

    /// Stops accepting, stops the sweeper, and waits for their threads.
    ///
    /// Connection threads already running finish on their own.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when a background thread panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        let Self {
            agent,
            control,
            sweeper,
            reporter,
            ..
        } = self;
        agent.shutdown();
        control.shutdown();
        sweeper.shutdown();
        agent.join()?;
        control.join()?;
        sweeper.join()?;
        info!(target: RUNTIME_TARGET, "listeners and sweeper stopped");
        reporter.shutdown_completed();
        Ok(())
    }
}
