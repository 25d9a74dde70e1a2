//! Operations invoked by the operator front end.
//!
//! [`RequestDispatcher::dispatch`] picks the target agent, records a pending
//! request, and queues the `capture` frame. The pending entry is inserted
//! before the frame is queued so a fast reply always finds it, and removed
//! again when queuing fails so no request is left orphaned.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::caller::CallerHandle;
use crate::clock::Clock;
use crate::identity::TokenSource;
use crate::pending::{PendingError, PendingRequests};
use crate::protocol::{CloseReason, OutboundFrame};
use crate::registry::{AgentHandle, AgentRegistry, AgentSnapshot};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Result of a capture dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No agent is connected.
    NoAgents,
    /// The named agent is not registered.
    UnknownAgent {
        /// Requested id.
        id: String,
    },
    /// The agent is registered but its connection is no longer open.
    AgentDisconnected {
        /// Agent id.
        id: String,
        /// Display label.
        display_name: String,
    },
    /// Queuing the capture failed; nothing was left pending.
    SendFailed {
        /// Agent id.
        id: String,
        /// Display label.
        display_name: String,
        /// What went wrong.
        reason: String,
    },
    /// The capture is on its way and its result will reach the caller.
    Dispatched {
        /// Agent id.
        id: String,
        /// Display label.
        display_name: String,
        /// Request token.
        token: String,
    },
}

impl DispatchOutcome {
    /// Whether the caller should wait for a result.
    #[must_use]
    pub const fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAgents => formatter.write_str("no agents available"),
            Self::UnknownAgent { id } => {
                write!(formatter, "unknown agent '{id}'; list agents to pick a valid id")
            }
            Self::AgentDisconnected { display_name, .. } => write!(
                formatter,
                "agent {display_name} disconnected; retry or choose another agent"
            ),
            Self::SendFailed {
                display_name,
                reason,
                ..
            } => write!(
                formatter,
                "failed to send capture request to {display_name}: {reason}"
            ),
            Self::Dispatched { display_name, .. } => write!(
                formatter,
                "capture request sent to {display_name}; awaiting response"
            ),
        }
    }
}

/// Result of an administrative disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The agent was removed and its connection asked to close.
    Disconnected {
        /// Agent id.
        id: String,
        /// Display label.
        display_name: String,
    },
    /// No agent with that id is registered.
    UnknownAgent {
        /// Requested id.
        id: String,
    },
}

impl fmt::Display for DisconnectOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { display_name, .. } => {
                write!(formatter, "disconnected agent {display_name}")
            }
            Self::UnknownAgent { id } => write!(formatter, "unknown agent '{id}'"),
        }
    }
}

/// Front-end entry points over the shared registry and pending table.
pub struct RequestDispatcher {
    registry: Arc<AgentRegistry>,
    pending: Arc<PendingRequests>,
    clock: Arc<dyn Clock>,
    tokens: TokenSource,
}

impl RequestDispatcher {
    /// Creates a dispatcher over shared state.
    pub fn new(
        registry: Arc<AgentRegistry>,
        pending: Arc<PendingRequests>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            pending,
            clock,
            tokens: TokenSource::new(),
        }
    }

    /// Sends a capture instruction to `target`, or to any connected agent
    /// when no target is given.
    pub fn dispatch(
        &self,
        target: Option<&str>,
        caller: Arc<dyn CallerHandle>,
    ) -> DispatchOutcome {
        let agent = match target {
            None => match self.registry.any() {
                Some(agent) => agent,
                None => return DispatchOutcome::NoAgents,
            },
            Some(id) => match self.registry.handle(id) {
                Some(agent) => agent,
                None => return DispatchOutcome::UnknownAgent { id: id.to_owned() },
            },
        };

        if !agent.socket.is_open() {
            return DispatchOutcome::AgentDisconnected {
                id: agent.id,
                display_name: agent.display_name,
            };
        }

        let now = self.clock.now();
        let Some(token) = self.reserve_token(&agent, caller, now) else {
            warn!(
                target: DISPATCH_TARGET,
                agent = %agent.id,
                "no free request token"
            );
            return DispatchOutcome::SendFailed {
                id: agent.id,
                display_name: agent.display_name,
                reason: "could not allocate a request token".to_owned(),
            };
        };

        let frame = OutboundFrame::Capture {
            token: token.clone(),
        };
        let previous = self.registry.record_command(&agent.id, now);
        if let Err(error) = agent.socket.send(frame) {
            self.pending.resolve(&token);
            if let Some(previous) = previous {
                self.registry.revert_command(&agent.id, now, previous);
            }
            warn!(
                target: DISPATCH_TARGET,
                agent = %agent.id,
                token = %token,
                %error,
                "capture send failed"
            );
            return DispatchOutcome::SendFailed {
                id: agent.id,
                display_name: agent.display_name,
                reason: error.to_string(),
            };
        }

        info!(
            target: DISPATCH_TARGET,
            agent = %agent.id,
            name = %agent.display_name,
            token = %token,
            "capture dispatched"
        );
        DispatchOutcome::Dispatched {
            id: agent.id,
            display_name: agent.display_name,
            token,
        }
    }

    fn reserve_token(
        &self,
        agent: &AgentHandle,
        caller: Arc<dyn CallerHandle>,
        now: time::OffsetDateTime,
    ) -> Option<String> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = self.tokens.next(now, &agent.id);
            match self
                .pending
                .insert(&token, Arc::clone(&caller), &agent.id, now)
            {
                Ok(()) => return Some(token),
                Err(PendingError::DuplicateToken { .. }) => {}
            }
        }
        None
    }

    /// Current agents in admission order.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentSnapshot> {
        self.registry.list()
    }

    /// Removes an agent and closes its connection.
    ///
    /// Requests already sent to the agent stay pending until they time out.
    pub fn disconnect_agent(&self, id: &str) -> DisconnectOutcome {
        match self.registry.remove(id) {
            Some(agent) => {
                agent.socket.close(CloseReason::Operator);
                info!(
                    target: DISPATCH_TARGET,
                    agent = %agent.id,
                    name = %agent.display_name,
                    "agent disconnected by operator"
                );
                DisconnectOutcome::Disconnected {
                    id: agent.id,
                    display_name: agent.display_name,
                }
            }
            None => DisconnectOutcome::UnknownAgent { id: id.to_owned() },
        }
    }
}
