//! One thread per agent WebSocket.
//!
//! The thread polls the socket with a short read timeout. Between reads it
//! drains the connection's outbound queue, so frames queued by the dispatcher
//! or a close requested by an operator go out within one poll interval.
//! A connection that has not authenticated within ten seconds is closed
//! with `1008`.

use std::borrow::Cow;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::{Error as WsError, Message, WebSocket};

use super::socket::{self, Outgoing, SocketQueue};
use crate::handshake::{AgentSession, AuthGate, SessionStep};
use crate::protocol::{CloseReason, OutboundFrame};
use crate::router::ReplyRouter;
use crate::transport::{ConnectionHandler, ConnectionStream};

const AGENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::agent");
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// How long an upgraded connection may stay unauthenticated.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves agent connections accepted by the agent listener.
pub(crate) struct AgentConnectionHandler {
    gate: Arc<AuthGate>,
    router: Arc<ReplyRouter>,
    auth_timeout: Duration,
}

impl AgentConnectionHandler {
    pub(crate) const fn new(gate: Arc<AuthGate>, router: Arc<ReplyRouter>) -> Self {
        Self {
            gate,
            router,
            auth_timeout: AUTH_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub(crate) const fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }
}

impl ConnectionHandler for AgentConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        if let Err(error) = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)) {
            warn!(target: AGENT_TARGET, %peer, %error, "failed to set handshake timeout");
            return;
        }
        let mut websocket = match tungstenite::accept(stream) {
            Ok(websocket) => websocket,
            Err(error) => {
                warn!(target: AGENT_TARGET, %peer, %error, "websocket handshake failed");
                return;
            }
        };

        let (handle, queue) = socket::channel();
        let mut session = AgentSession::new(
            peer.clone(),
            handle,
            Arc::clone(&self.gate),
            Arc::clone(&self.router),
        );
        debug!(target: AGENT_TARGET, %peer, "agent connection opened");

        let auth_deadline = Instant::now() + self.auth_timeout;
        if let Err(error) = serve(&mut websocket, &mut session, &queue, auth_deadline) {
            warn!(target: AGENT_TARGET, %peer, %error, "agent connection error");
        }
        queue.mark_closed();
        session.finish();
        debug!(target: AGENT_TARGET, %peer, "agent connection closed");
    }
}

fn serve(
    websocket: &mut WebSocket<ConnectionStream>,
    session: &mut AgentSession,
    queue: &SocketQueue,
    auth_deadline: Instant,
) -> Result<(), WsError> {
    websocket.get_ref().set_read_timeout(Some(POLL_INTERVAL))?;
    let mut closing_since: Option<Instant> = None;

    loop {
        while let Some(item) = queue.try_next() {
            match item {
                Outgoing::Frame(frame) if closing_since.is_none() => send(websocket, &frame)?,
                Outgoing::Frame(_) => {}
                Outgoing::Close(reason) => {
                    begin_close(websocket, reason)?;
                    closing_since.get_or_insert_with(Instant::now);
                }
            }
        }
        if closing_since.is_some_and(|since| since.elapsed() > CLOSE_GRACE) {
            return Ok(());
        }
        if closing_since.is_none() && Instant::now() >= auth_deadline {
            if let SessionStep::Close(reason) = session.expire() {
                debug!(target: AGENT_TARGET, "agent did not authenticate in time");
                apply_close(websocket, queue, reason, &mut closing_since)?;
            }
        }

        let step = match websocket.read() {
            Ok(Message::Text(text)) => session.on_text(&text),
            Ok(Message::Binary(bytes)) => session.on_binary(bytes.len()),
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                session.on_heartbeat();
                continue;
            }
            Ok(Message::Close(_)) => {
                queue.mark_closed();
                continue;
            }
            Ok(Message::Frame(_)) => continue,
            Err(WsError::Io(error)) if is_poll_timeout(&error) => continue,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(()),
            Err(error) => return Err(error),
        };
        match step {
            SessionStep::Reply(frame) => send(websocket, &frame)?,
            SessionStep::Close(reason) => apply_close(websocket, queue, reason, &mut closing_since)?,
            SessionStep::Routed(_) | SessionStep::Dropped => {}
        }
    }
}

fn apply_close(
    websocket: &mut WebSocket<ConnectionStream>,
    queue: &SocketQueue,
    reason: CloseReason,
    closing_since: &mut Option<Instant>,
) -> Result<(), WsError> {
    queue.mark_closed();
    begin_close(websocket, reason)?;
    closing_since.get_or_insert_with(Instant::now);
    Ok(())
}

fn send(websocket: &mut WebSocket<ConnectionStream>, frame: &OutboundFrame) -> Result<(), WsError> {
    websocket.send(Message::text(frame.encode()))
}

fn begin_close(
    websocket: &mut WebSocket<ConnectionStream>,
    reason: CloseReason,
) -> Result<(), WsError> {
    let frame = CloseFrame {
        code: CloseCode::from(reason.code()),
        reason: Cow::Borrowed(reason.reason()),
    };
    match websocket.close(Some(frame)) {
        Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
        Err(WsError::Io(error)) if is_poll_timeout(&error) => Ok(()),
        Err(error) => Err(error),
    }
}

fn is_poll_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
