//! Operator control socket.
//!
//! Each connection carries one JSONL request and receives a stream of JSONL
//! responses ending with an `exit` message. A `capture` connection stays open
//! until its result arrives; the connection itself is the caller handle.

mod errors;
mod handler;
mod request;
mod response;

pub use self::errors::ControlError;
pub(crate) use self::handler::ControlConnectionHandler;
pub use self::request::ControlRequest;
pub use self::response::{AgentSummary, ControlMessage, ResponseWriter};

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");
