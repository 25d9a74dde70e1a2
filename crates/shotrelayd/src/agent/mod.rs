//! Agent-facing WebSocket endpoint.

mod connection;
mod socket;

pub(crate) use self::connection::AgentConnectionHandler;
pub use self::socket::{AgentSocket, ChannelSocket, SocketClosed};
pub(crate) use self::socket::{Outgoing, SocketQueue, channel};
