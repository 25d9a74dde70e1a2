//! Screenshot relay broker.
//!
//! Remote capture agents connect over WebSocket, authenticate with a shared
//! token, and wait for capture instructions. Operators ask for a screenshot
//! through the control socket; the broker forwards the instruction to one
//! agent, remembers who asked under a short request token, and hands the
//! agent's image (or error) back to exactly that requester. Requests the agent
//! never answers are swept after a configurable timeout and reported to the
//! requester as timed out.
//!
//! The core is synchronous and thread-based. [`AgentRegistry`] and
//! [`PendingRequests`] are the only shared tables; each is guarded by its own
//! lock and no lock is held while talking to a socket. Every agent connection
//! owns an outbound queue, and the registry keeps only a handle onto it
//! ([`AgentSocket`]), so dispatching a capture never blocks on network I/O.
//!
//! [`bootstrap_with`] loads and validates configuration, installs telemetry,
//! and builds the [`Broker`]; [`Runtime`] binds the agent and control
//! listeners and starts the [`TimeoutSweeper`]; [`run_daemon`] ties both to
//! the process signal lifecycle.

mod agent;
mod bootstrap;
mod broker;
mod caller;
mod clock;
mod control;
mod dispatcher;
mod handshake;
mod health;
mod identity;
mod pending;
mod process;
mod protocol;
mod registry;
mod router;
mod runtime;
mod sweeper;
mod telemetry;
mod transport;

pub use agent::{AgentSocket, ChannelSocket, SocketClosed};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use broker::{Broker, BrokerSettings};
pub use caller::{CallerHandle, ChannelCaller, Delivery, DeliveryError};
pub use clock::{Clock, SystemClock};
pub use control::{AgentSummary, ControlError, ControlMessage, ControlRequest, ResponseWriter};
pub use dispatcher::{DisconnectOutcome, DispatchOutcome, RequestDispatcher};
pub use handshake::{Admission, AgentSession, AuthGate, SessionState, SessionStep};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use identity::{AGENT_ID_LEN, REQUEST_TOKEN_LEN, TokenSource, agent_id};
pub use pending::{PendingError, PendingRequest, PendingRequests};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use protocol::{CloseReason, InboundFrame, OutboundFrame};
pub use registry::{
    AgentHandle, AgentRegistration, AgentRegistry, AgentSnapshot, AgentStatus, RegistryError,
    clock_time,
};
pub use router::{CAPTURE_FAILED_PREFIX, ReplyRouter, RouteOutcome};
pub use runtime::Runtime;
pub use sweeper::{SweeperError, SweeperHandle, TIMEOUT_MESSAGE, TimeoutSweeper};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
