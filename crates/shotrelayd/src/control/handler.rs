//! Serves one control request per connection.

use std::io::{self, Read};
use std::sync::{Arc, mpsc};

use tracing::{debug, info, warn};

use super::CONTROL_TARGET;
use super::errors::ControlError;
use super::request::ControlRequest;
use super::response::{AgentSummary, ControlMessage, ResponseWriter};
use crate::broker::Broker;
use crate::caller::{ChannelCaller, Delivery};
use crate::dispatcher::DisconnectOutcome;
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Maximum size of a request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 64 * 1024;

const BROKER_GONE: &str = "capture abandoned: broker is shutting down";

/// Answers operator requests against the shared broker.
pub(crate) struct ControlConnectionHandler {
    broker: Arc<Broker>,
}

impl ControlConnectionHandler {
    pub(crate) const fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    fn serve(&self, mut stream: ConnectionStream) {
        let line = match read_request_line(&mut stream) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: CONTROL_TARGET, "client disconnected without request");
                return;
            }
            Err(error) => {
                warn!(target: CONTROL_TARGET, %error, "failed to read request");
                let _ = ResponseWriter::new(&mut stream).write_error(&error);
                return;
            }
        };

        let mut writer = ResponseWriter::new(&mut stream);
        let request = match ControlRequest::parse(&line) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: CONTROL_TARGET, %error, "malformed request");
                let _ = writer.write_error(&error);
                return;
            }
        };

        debug!(target: CONTROL_TARGET, ?request, "control request");
        let result = match request {
            ControlRequest::List => self.list(&mut writer),
            ControlRequest::Disconnect { agent } => self.disconnect(&agent, &mut writer),
            ControlRequest::Capture { agent } => self.capture(agent.as_deref(), &mut writer),
        };
        if let Err(error) = result {
            warn!(target: CONTROL_TARGET, %error, "failed to answer control request");
        }
    }

    fn list(&self, writer: &mut ResponseWriter<&mut ConnectionStream>) -> Result<(), ControlError> {
        let agents = self
            .broker
            .list_agents()
            .iter()
            .map(AgentSummary::from)
            .collect();
        writer.write_message(&ControlMessage::Agents { agents })?;
        writer.write_exit(0)
    }

    fn disconnect(
        &self,
        agent: &str,
        writer: &mut ResponseWriter<&mut ConnectionStream>,
    ) -> Result<(), ControlError> {
        let outcome = self.broker.disconnect_agent(agent);
        writer.write_notice(outcome.to_string())?;
        match outcome {
            DisconnectOutcome::Disconnected { .. } => writer.write_exit(0),
            DisconnectOutcome::UnknownAgent { .. } => writer.write_exit(1),
        }
    }

    /// Dispatches a capture, then blocks until the router or the sweeper
    /// hands the result to this connection.
    fn capture(
        &self,
        agent: Option<&str>,
        writer: &mut ResponseWriter<&mut ConnectionStream>,
    ) -> Result<(), ControlError> {
        let (sender, receiver) = mpsc::channel();
        let outcome = self
            .broker
            .dispatch(agent, Arc::new(ChannelCaller::new(sender)));
        writer.write_notice(outcome.to_string())?;
        if !outcome.is_dispatched() {
            return writer.write_exit(1);
        }

        match receiver.recv() {
            Ok(Delivery::Image { payload }) => {
                info!(target: CONTROL_TARGET, bytes = payload.len(), "capture delivered");
                writer.write_message(&ControlMessage::Image { payload })?;
                writer.write_exit(0)
            }
            Ok(Delivery::Text(text)) => {
                writer.write_message(&ControlMessage::message(text))?;
                writer.write_exit(1)
            }
            Err(_) => {
                writer.write_message(&ControlMessage::message(BROKER_GONE))?;
                writer.write_exit(1)
            }
        }
    }
}

impl ConnectionHandler for ControlConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

/// Reads one newline-terminated request, bounded by [`MAX_REQUEST_BYTES`].
///
/// Returns `Ok(None)` when the client disconnects without sending anything.
fn read_request_line(stream: &mut impl Read) -> Result<Option<Vec<u8>>, ControlError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    loop {
        let bytes_read = read_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok((!buffer.is_empty()).then_some(buffer));
        }
        if let Some(newline) = chunk[..bytes_read].iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(&chunk[..=newline]);
            enforce_limit(buffer.len())?;
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
        enforce_limit(buffer.len())?;
    }
}

fn read_with_retry(stream: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

fn enforce_limit(size: usize) -> Result<(), ControlError> {
    if size > MAX_REQUEST_BYTES {
        return Err(ControlError::RequestTooLarge {
            max_size: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}
