//! Wires the registry, pending table, and their operations together.

use std::sync::Arc;
use std::time::Duration;

use shotrelay_config::Config;

use crate::agent::AgentConnectionHandler;
use crate::caller::CallerHandle;
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::{DisconnectOutcome, DispatchOutcome, RequestDispatcher};
use crate::handshake::AuthGate;
use crate::pending::PendingRequests;
use crate::registry::{AgentRegistry, AgentSnapshot};
use crate::router::ReplyRouter;
use crate::sweeper::TimeoutSweeper;

/// Settings the broker needs from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Shared agent secret.
    pub auth_token: String,
    /// Admission cap.
    pub max_clients: usize,
    /// Age after which a capture times out.
    pub response_timeout: Duration,
}

impl From<&Config> for BrokerSettings {
    fn from(config: &Config) -> Self {
        Self {
            auth_token: config.auth_token().to_owned(),
            max_clients: config.max_clients(),
            response_timeout: config.response_timeout(),
        }
    }
}

/// The relay core shared by every connection thread and the sweeper.
pub struct Broker {
    registry: Arc<AgentRegistry>,
    pending: Arc<PendingRequests>,
    clock: Arc<dyn Clock>,
    gate: Arc<AuthGate>,
    router: Arc<ReplyRouter>,
    dispatcher: RequestDispatcher,
    response_timeout: Duration,
}

impl Broker {
    /// Builds a broker on the system clock.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(BrokerSettings::from(config), Arc::new(SystemClock))
    }

    /// Builds a broker with an explicit clock.
    pub fn new(settings: BrokerSettings, clock: Arc<dyn Clock>) -> Self {
        let BrokerSettings {
            auth_token,
            max_clients,
            response_timeout,
        } = settings;
        let registry = Arc::new(AgentRegistry::new());
        let pending = Arc::new(PendingRequests::new());
        let gate = Arc::new(AuthGate::new(
            Arc::clone(&registry),
            Arc::clone(&clock),
            auth_token,
            max_clients,
        ));
        let router = Arc::new(ReplyRouter::new(
            Arc::clone(&registry),
            Arc::clone(&pending),
            Arc::clone(&clock),
        ));
        let dispatcher = RequestDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&pending),
            Arc::clone(&clock),
        );
        Self {
            registry,
            pending,
            clock,
            gate,
            router,
            dispatcher,
            response_timeout,
        }
    }

    /// See [`RequestDispatcher::dispatch`].
    pub fn dispatch(&self, target: Option<&str>, caller: Arc<dyn CallerHandle>) -> DispatchOutcome {
        self.dispatcher.dispatch(target, caller)
    }

    /// See [`RequestDispatcher::list_agents`].
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentSnapshot> {
        self.dispatcher.list_agents()
    }

    /// See [`RequestDispatcher::disconnect_agent`].
    pub fn disconnect_agent(&self, id: &str) -> DisconnectOutcome {
        self.dispatcher.disconnect_agent(id)
    }

    /// Sweeper bound to this broker's pending table and timeout.
    #[must_use]
    pub fn sweeper(&self) -> TimeoutSweeper {
        TimeoutSweeper::new(
            Arc::clone(&self.pending),
            Arc::clone(&self.clock),
            self.response_timeout,
        )
    }

    /// Registered agents.
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Outstanding captures.
    #[must_use]
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub(crate) fn agent_handler(&self) -> AgentConnectionHandler {
        AgentConnectionHandler::new(Arc::clone(&self.gate), Arc::clone(&self.router))
    }
}
