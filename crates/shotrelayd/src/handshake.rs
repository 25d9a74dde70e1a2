//! Per-connection authentication state machine.
//!
//! A connection starts `Unauthenticated`. Its first frame must be
//! `auth:<token>:<name>`; anything else closes it with "authenticate first".
//! A wrong secret closes it with "invalid token". A correct secret admits the
//! agent unless the registry is full, in which case the agent is closed
//! without ever being registered. Once `Authenticated`, every frame goes to
//! the [`ReplyRouter`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::agent::AgentSocket;
use crate::clock::Clock;
use crate::identity;
use crate::protocol::{CloseReason, InboundFrame, OutboundFrame};
use crate::registry::{AgentRegistration, AgentRegistry, RegistryError};
use crate::router::{ReplyRouter, RouteOutcome};

const HANDSHAKE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handshake");
const MAX_ID_ATTEMPTS: u32 = 8;
const FALLBACK_NAME_CHARS: usize = 6;

/// Identity assigned to an admitted agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Assigned id.
    pub id: String,
    /// Display label.
    pub display_name: String,
}

/// Checks secrets and admits agents into the registry.
pub struct AuthGate {
    registry: Arc<AgentRegistry>,
    clock: Arc<dyn Clock>,
    auth_token: String,
    max_clients: usize,
}

impl AuthGate {
    /// Creates a gate for the given secret and admission cap.
    pub fn new(
        registry: Arc<AgentRegistry>,
        clock: Arc<dyn Clock>,
        auth_token: impl Into<String>,
        max_clients: usize,
    ) -> Self {
        Self {
            registry,
            clock,
            auth_token: auth_token.into(),
            max_clients,
        }
    }

    /// Validates the first frame of a connection and registers the agent.
    ///
    /// # Errors
    ///
    /// Returns the [`CloseReason`] the connection must be closed with.
    pub fn admit(
        &self,
        frame: &InboundFrame,
        peer: &str,
        socket: Arc<dyn AgentSocket>,
    ) -> Result<Admission, CloseReason> {
        let InboundFrame::Auth { token, name } = frame else {
            return Err(CloseReason::AuthenticateFirst);
        };
        if *token != self.auth_token {
            return Err(CloseReason::InvalidToken);
        }

        let now = self.clock.now();
        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = identity::agent_id(peer, now, attempt);
            let display_name = if name.is_empty() {
                fallback_name(&id)
            } else {
                name.clone()
            };
            let registration = AgentRegistration {
                id: id.clone(),
                display_name: display_name.clone(),
                socket: Arc::clone(&socket),
                admitted_at: now,
            };
            match self.registry.register(registration, self.max_clients) {
                Ok(()) => return Ok(Admission { id, display_name }),
                Err(RegistryError::CapacityExceeded { .. }) => {
                    return Err(CloseReason::CapacityExceeded);
                }
                Err(RegistryError::DuplicateId { id }) => {
                    warn!(
                        target: HANDSHAKE_TARGET,
                        agent = %id,
                        attempt,
                        "agent id collision, drawing another"
                    );
                }
            }
        }
        error!(
            target: HANDSHAKE_TARGET,
            peer = %peer,
            attempts = MAX_ID_ATTEMPTS,
            "every agent id drawn for this peer is taken"
        );
        Err(CloseReason::IdUnavailable)
    }

    /// Forgets an agent whose connection has ended.
    pub fn release(&self, agent_id: &str) {
        self.registry.remove(agent_id);
    }
}

fn fallback_name(id: &str) -> String {
    let short: String = id.chars().take(FALLBACK_NAME_CHARS).collect();
    format!("agent-{short}")
}

/// Where a connection stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the `auth` frame.
    Unauthenticated,
    /// Admitted under the given id.
    Authenticated {
        /// Assigned id.
        agent_id: String,
    },
    /// Rejected; no further frames are processed.
    Closed,
}

/// What the connection must do after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStep {
    /// Send this frame to the agent.
    Reply(OutboundFrame),
    /// Close the connection.
    Close(CloseReason),
    /// The frame was routed.
    Routed(RouteOutcome),
    /// The connection is already closed; the frame was dropped.
    Dropped,
}

/// State machine driving one agent connection.
pub struct AgentSession {
    state: SessionState,
    peer: String,
    socket: Arc<dyn AgentSocket>,
    gate: Arc<AuthGate>,
    router: Arc<ReplyRouter>,
}

impl AgentSession {
    /// Starts an unauthenticated session for `peer`.
    pub fn new(
        peer: impl Into<String>,
        socket: Arc<dyn AgentSocket>,
        gate: Arc<AuthGate>,
        router: Arc<ReplyRouter>,
    ) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            peer: peer.into(),
            socket,
            gate,
            router,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Id assigned at admission, if any.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { agent_id } => Some(agent_id),
            SessionState::Unauthenticated | SessionState::Closed => None,
        }
    }

    /// Processes one text frame.
    pub fn on_text(&mut self, text: &str) -> SessionStep {
        let frame = InboundFrame::parse(text);
        match &self.state {
            SessionState::Closed => SessionStep::Dropped,
            SessionState::Authenticated { agent_id } => {
                SessionStep::Routed(self.router.route(agent_id, frame))
            }
            SessionState::Unauthenticated => self.authenticate(&frame),
        }
    }

    fn authenticate(&mut self, frame: &InboundFrame) -> SessionStep {
        match self.gate.admit(frame, &self.peer, Arc::clone(&self.socket)) {
            Ok(Admission { id, display_name }) => {
                info!(
                    target: HANDSHAKE_TARGET,
                    peer = %self.peer,
                    agent = %id,
                    name = %display_name,
                    "agent authenticated"
                );
                self.state = SessionState::Authenticated {
                    agent_id: id.clone(),
                };
                SessionStep::Reply(OutboundFrame::AuthSuccess { id })
            }
            Err(reason) => self.reject(reason),
        }
    }

    /// Processes one binary frame. The protocol is text-only, so before
    /// authentication this is a violation and afterwards it only counts as
    /// activity.
    pub fn on_binary(&mut self, len: usize) -> SessionStep {
        match &self.state {
            SessionState::Closed => SessionStep::Dropped,
            SessionState::Authenticated { agent_id } => {
                debug!(
                    target: HANDSHAKE_TARGET,
                    agent = %agent_id,
                    bytes = len,
                    "binary frame ignored"
                );
                self.router.touch(agent_id);
                SessionStep::Routed(RouteOutcome::Ignored)
            }
            SessionState::Unauthenticated => self.reject(CloseReason::AuthenticateFirst),
        }
    }

    /// Records a ping or pong as activity from an admitted agent.
    pub fn on_heartbeat(&self) {
        if let SessionState::Authenticated { agent_id } = &self.state {
            self.router.touch(agent_id);
        }
    }

    /// Closes a connection that did not authenticate in time. Admitted
    /// sessions are unaffected.
    pub fn expire(&mut self) -> SessionStep {
        match self.state {
            SessionState::Unauthenticated => self.reject(CloseReason::AuthenticateFirst),
            SessionState::Authenticated { .. } | SessionState::Closed => SessionStep::Dropped,
        }
    }

    fn reject(&mut self, reason: CloseReason) -> SessionStep {
        warn!(
            target: HANDSHAKE_TARGET,
            peer = %self.peer,
            reason = %reason,
            "agent rejected"
        );
        self.state = SessionState::Closed;
        SessionStep::Close(reason)
    }

    /// Ends the session, removing the agent from the registry if admitted.
    pub fn finish(&mut self) {
        if let SessionState::Authenticated { agent_id } = &self.state {
            self.gate.release(agent_id);
            info!(
                target: HANDSHAKE_TARGET,
                peer = %self.peer,
                agent = %agent_id,
                "agent connection ended"
            );
        }
        self.state = SessionState::Closed;
    }
}
