//! Live set of authenticated agents.
//!
//! The registry owns every agent's socket handle and activity timestamps.
//! All access goes through one mutex; admission checks the capacity and
//! inserts under the same guard so concurrent handshakes can never exceed the
//! cap.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use crate::agent::AgentSocket;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Data needed to admit a freshly authenticated agent.
pub struct AgentRegistration {
    /// Assigned id.
    pub id: String,
    /// Display label.
    pub display_name: String,
    /// Send-side handle of the connection.
    pub socket: Arc<dyn AgentSocket>,
    /// Admission time, used as the first `last_seen_at`.
    pub admitted_at: OffsetDateTime,
}

/// Errors raised when admitting an agent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry already holds `capacity` agents.
    #[error("registry is full ({capacity} agents)")]
    CapacityExceeded {
        /// Configured cap.
        capacity: usize,
    },
    /// Another live agent already uses this id.
    #[error("agent id {id} is already registered")]
    DuplicateId {
        /// Conflicting id.
        id: String,
    },
}

/// Point-in-time copy of an agent's public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Agent id.
    pub id: String,
    /// Display label.
    pub display_name: String,
    /// Last inbound frame, or admission time.
    pub last_seen_at: OffsetDateTime,
    /// Last capture dispatched to the agent.
    pub last_command_at: Option<OffsetDateTime>,
    /// Last image answered since the most recent capture.
    pub last_response_at: Option<OffsetDateTime>,
}

impl AgentSnapshot {
    /// Summarises the agent's request state.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        match (self.last_response_at, self.last_command_at) {
            (Some(at), _) => AgentStatus::Responded(at),
            (None, Some(at)) => AgentStatus::Awaiting(at),
            (None, None) => AgentStatus::Idle,
        }
    }
}

/// Request state shown in agent listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Answered the latest capture at the given time.
    Responded(OffsetDateTime),
    /// Sent a capture at the given time that is still unanswered.
    Awaiting(OffsetDateTime),
    /// Never asked for a capture.
    Idle,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responded(at) => write!(formatter, "last response {}", clock_time(*at)),
            Self::Awaiting(at) => write!(formatter, "awaiting response ({})", clock_time(*at)),
            Self::Idle => formatter.write_str("idle"),
        }
    }
}

/// Formats a timestamp as `HH:MM:SS`.
#[must_use]
pub fn clock_time(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| at.time().to_string())
}

/// Command and response times replaced by a new command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandActivity {
    /// Previous `last_command_at`.
    pub last_command_at: Option<OffsetDateTime>,
    /// Previous `last_response_at`.
    pub last_response_at: Option<OffsetDateTime>,
}

/// Agent details needed to talk to it.
#[derive(Clone)]
pub struct AgentHandle {
    /// Agent id.
    pub id: String,
    /// Display label.
    pub display_name: String,
    /// Send-side handle of the connection.
    pub socket: Arc<dyn AgentSocket>,
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("open", &self.socket.is_open())
            .finish()
    }
}

struct AgentRecord {
    display_name: String,
    socket: Arc<dyn AgentSocket>,
    last_seen_at: OffsetDateTime,
    last_command_at: Option<OffsetDateTime>,
    last_response_at: Option<OffsetDateTime>,
    seq: u64,
}

impl AgentRecord {
    fn handle(&self, id: &str) -> AgentHandle {
        AgentHandle {
            id: id.to_owned(),
            display_name: self.display_name.clone(),
            socket: Arc::clone(&self.socket),
        }
    }

    fn snapshot(&self, id: &str) -> AgentSnapshot {
        AgentSnapshot {
            id: id.to_owned(),
            display_name: self.display_name.clone(),
            last_seen_at: self.last_seen_at,
            last_command_at: self.last_command_at,
            last_response_at: self.last_response_at,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    agents: HashMap<String, AgentRecord>,
    next_seq: u64,
}

/// Mutex-guarded map of connected agents.
#[derive(Default)]
pub struct AgentRegistry {
    state: Mutex<RegistryState>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AgentRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Admits an agent unless the registry is full or the id is taken.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExceeded`] when `capacity` agents are
    /// already registered and [`RegistryError::DuplicateId`] when the id is in
    /// use. Neither error leaves any trace in the registry.
    pub fn register(
        &self,
        registration: AgentRegistration,
        capacity: usize,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if state.agents.len() >= capacity {
            return Err(RegistryError::CapacityExceeded { capacity });
        }
        if state.agents.contains_key(&registration.id) {
            return Err(RegistryError::DuplicateId {
                id: registration.id,
            });
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let AgentRegistration {
            id,
            display_name,
            socket,
            admitted_at,
        } = registration;
        info!(
            target: REGISTRY_TARGET,
            agent = %id,
            name = %display_name,
            connected = state.agents.len() + 1,
            "agent registered"
        );
        state.agents.insert(
            id,
            AgentRecord {
                display_name,
                socket,
                last_seen_at: admitted_at,
                last_command_at: None,
                last_response_at: None,
                seq,
            },
        );
        Ok(())
    }

    /// Current state of one agent.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<AgentSnapshot> {
        self.lock().agents.get(id).map(|record| record.snapshot(id))
    }

    /// Socket handle and label of one agent.
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<AgentHandle> {
        self.lock().agents.get(id).map(|record| record.handle(id))
    }

    /// Some registered agent, with no promise about which one.
    #[must_use]
    pub fn any(&self) -> Option<AgentHandle> {
        self.lock()
            .agents
            .iter()
            .next()
            .map(|(id, record)| record.handle(id))
    }

    /// Drops an agent. Removing an unknown id does nothing.
    pub fn remove(&self, id: &str) -> Option<AgentHandle> {
        let removed = self.lock().agents.remove(id).map(|record| record.handle(id));
        if let Some(handle) = &removed {
            info!(
                target: REGISTRY_TARGET,
                agent = %handle.id,
                name = %handle.display_name,
                "agent removed"
            );
        }
        removed
    }

    /// All agents in admission order.
    #[must_use]
    pub fn list(&self) -> Vec<AgentSnapshot> {
        let state = self.lock();
        let mut records: Vec<_> = state.agents.iter().collect();
        records.sort_by_key(|(_, record)| record.seq);
        records
            .into_iter()
            .map(|(id, record)| record.snapshot(id))
            .collect()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().agents.len()
    }

    /// Whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records inbound traffic from an agent.
    pub fn touch_seen(&self, id: &str, at: OffsetDateTime) -> bool {
        self.update(id, |record| record.last_seen_at = at)
    }

    /// Records a dispatched capture and clears the previous response time.
    /// Returns the activity it replaced, or `None` for an unknown agent.
    pub fn record_command(&self, id: &str, at: OffsetDateTime) -> Option<CommandActivity> {
        let mut previous = None;
        self.update(id, |record| {
            previous = Some(CommandActivity {
                last_command_at: record.last_command_at.replace(at),
                last_response_at: record.last_response_at.take(),
            });
        });
        previous
    }

    /// Undoes a [`record_command`](Self::record_command) whose capture never
    /// left. Nothing changes if the agent has since been commanded again or
    /// has answered.
    pub fn revert_command(&self, id: &str, at: OffsetDateTime, previous: CommandActivity) -> bool {
        let mut reverted = false;
        self.update(id, |record| {
            if record.last_command_at == Some(at) && record.last_response_at.is_none() {
                record.last_command_at = previous.last_command_at;
                record.last_response_at = previous.last_response_at;
                reverted = true;
            }
        });
        reverted
    }

    /// Records an answered capture.
    pub fn record_response(&self, id: &str, at: OffsetDateTime) -> bool {
        self.update(id, |record| record.last_response_at = Some(at))
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut AgentRecord)) -> bool {
        let mut state = self.lock();
        let Some(record) = state.agents.get_mut(id) else {
            debug!(target: REGISTRY_TARGET, agent = %id, "update for unknown agent");
            return false;
        };
        apply(record);
        true
    }
}
