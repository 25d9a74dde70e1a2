//! Minimal WebSocket agent used against a running relay.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// First thing the relay said after the `auth` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Greeting {
    /// `auth:success:<id>` arrived.
    Accepted(String),
    /// The relay closed the connection.
    Closed {
        /// Close code, when a close frame was sent.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
    /// Any other text frame.
    Unexpected(String),
}

/// Test-side agent connection.
pub struct TestAgent {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl TestAgent {
    /// Opens a WebSocket to the relay's agent listener.
    #[must_use]
    pub fn connect(addr: SocketAddr) -> Self {
        let (socket, _) = tungstenite::connect(format!("ws://{addr}/")).expect("agent connects");
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_read_timeout(Some(READ_TIMEOUT))
                .expect("read timeout applies");
        }
        Self { socket }
    }

    /// Connects and authenticates, returning the relay's answer.
    #[must_use]
    pub fn authenticate(addr: SocketAddr, token: &str, name: &str) -> (Self, Greeting) {
        let mut agent = Self::connect(addr);
        agent.send(&format!("auth:{token}:{name}"));
        let greeting = agent.greeting();
        (agent, greeting)
    }

    /// Sends one text frame.
    pub fn send(&mut self, text: &str) {
        self.socket
            .send(Message::text(text.to_owned()))
            .expect("agent sends frame");
    }

    /// Sends one binary frame.
    pub fn send_binary(&mut self, bytes: &[u8]) {
        self.socket
            .send(Message::binary(bytes.to_vec()))
            .expect("agent sends binary frame");
    }

    /// Sends a ping.
    pub fn ping(&mut self) {
        self.socket
            .send(Message::Ping(Vec::new()))
            .expect("agent sends ping");
    }

    /// Next text frame, or `None` once the relay closed the connection.
    pub fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                    return None;
                }
                Ok(_) => {}
                Err(error) => panic!("agent read failed: {error}"),
            }
        }
    }

    /// Waits for the relay to close the connection and returns its close code.
    pub fn await_close(&mut self) -> Option<u16> {
        loop {
            match self.socket.read() {
                Ok(Message::Close(frame)) => return frame.map(|frame| u16::from(frame.code)),
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Ok(_) => {}
                Err(error) => panic!("agent read failed: {error}"),
            }
        }
    }

    /// Reads the relay's answer to the first frame.
    pub fn greeting(&mut self) -> Greeting {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => {
                    return text.strip_prefix("auth:success:").map_or_else(
                        || Greeting::Unexpected(text.clone()),
                        |id| Greeting::Accepted(id.to_owned()),
                    );
                }
                Ok(Message::Close(frame)) => {
                    return Greeting::Closed {
                        code: frame.as_ref().map(|frame| u16::from(frame.code)),
                        reason: frame.map(|frame| frame.reason.into_owned()).unwrap_or_default(),
                    };
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                    return Greeting::Closed {
                        code: None,
                        reason: String::new(),
                    };
                }
                Ok(_) => {}
                Err(error) => panic!("agent read failed: {error}"),
            }
        }
    }
}
