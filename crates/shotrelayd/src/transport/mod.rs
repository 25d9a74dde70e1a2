//! Socket listeners for the agent and control endpoints.
//!
//! Each listener binds one [`SocketEndpoint`](shotrelay_config::SocketEndpoint)
//! and accepts connections on a background thread, handing every accepted
//! stream to a [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
