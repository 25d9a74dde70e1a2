//! Text frames exchanged with agents.
//!
//! Every frame is a colon-delimited string with a case-sensitive prefix:
//!
//! | direction | frame |
//! |---|---|
//! | agent → daemon | `auth:<token>:<name>` |
//! | daemon → agent | `auth:success:<id>` |
//! | daemon → agent | `capture:<request token>` |
//! | agent → daemon | `image:<request token>:<base64 payload>` |
//! | agent → daemon | `error:<request token>:<message>` |
//!
//! `image` and `error` frames split on the first two colons only, so the
//! payload or message may itself contain colons. Decoding never fails: frames
//! that do not fit the grammar decode as [`InboundFrame::Unrecognized`].

use std::fmt;

const DELIMITER: char = ':';

/// Frame received from an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Authentication attempt carrying the shared secret.
    Auth {
        /// Presented secret.
        token: String,
        /// Proposed display name; empty when absent.
        name: String,
    },
    /// Successful capture reply.
    Image {
        /// Request token being answered.
        token: String,
        /// Base64 image data, passed through untouched.
        payload: String,
    },
    /// Failed capture reply.
    Error {
        /// Request token being answered.
        token: String,
        /// Agent-supplied failure text.
        message: String,
    },
    /// Anything else, kept verbatim for logging.
    Unrecognized(String),
}

impl InboundFrame {
    /// Decodes a text frame.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut parts = text.splitn(3, DELIMITER);
        let prefix = parts.next().unwrap_or_default();
        let first = parts.next();
        let rest = parts.next();

        match (prefix, first, rest) {
            ("auth", Some(token), name) => Self::Auth {
                token: token.to_owned(),
                name: name.unwrap_or_default().to_owned(),
            },
            ("image", Some(token), Some(payload)) if !token.is_empty() => Self::Image {
                token: token.to_owned(),
                payload: payload.to_owned(),
            },
            ("error", Some(token), Some(message)) if !token.is_empty() => Self::Error {
                token: token.to_owned(),
                message: message.to_owned(),
            },
            _ => Self::Unrecognized(text.to_owned()),
        }
    }

    /// Whether this frame is an authentication attempt.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Frame sent to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Confirms authentication and announces the assigned id.
    AuthSuccess {
        /// Assigned agent id.
        id: String,
    },
    /// Instructs the agent to capture a screenshot.
    Capture {
        /// Token the agent must echo in its reply.
        token: String,
    },
}

impl OutboundFrame {
    /// Encodes the frame as wire text.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthSuccess { id } => write!(formatter, "auth:success:{id}"),
            Self::Capture { token } => write!(formatter, "capture:{token}"),
        }
    }
}

/// Reasons the daemon closes an agent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A frame other than `auth` arrived before authentication.
    AuthenticateFirst,
    /// The presented secret did not match.
    InvalidToken,
    /// The admission cap was reached.
    CapacityExceeded,
    /// No free agent id could be drawn for the peer.
    IdUnavailable,
    /// An operator disconnected the agent.
    Operator,
}

impl CloseReason {
    /// WebSocket close code sent with the close frame.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::AuthenticateFirst => 1008,
            Self::InvalidToken => 4001,
            Self::CapacityExceeded | Self::IdUnavailable => 1013,
            Self::Operator => 1000,
        }
    }

    /// Human-readable close reason.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::AuthenticateFirst => "authenticate first",
            Self::InvalidToken => "invalid token",
            Self::CapacityExceeded => "server client limit reached",
            Self::IdUnavailable => "agent id unavailable, retry later",
            Self::Operator => "disconnected by operator",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.reason(), self.code())
    }
}
