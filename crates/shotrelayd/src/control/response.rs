//! JSONL responses written back to control clients.

use std::io::Write;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::errors::ControlError;
use crate::registry::AgentSnapshot;

/// One agent as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    /// Agent id.
    pub id: String,
    /// Display label.
    pub display_name: String,
    /// RFC 3339 time of the last inbound frame.
    pub last_seen_at: String,
    /// RFC 3339 time of the last capture dispatched.
    pub last_command_at: Option<String>,
    /// RFC 3339 time of the last image received.
    pub last_response_at: Option<String>,
    /// Human-readable request state.
    pub status: String,
}

impl From<&AgentSnapshot> for AgentSummary {
    fn from(snapshot: &AgentSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            display_name: snapshot.display_name.clone(),
            last_seen_at: rfc3339(snapshot.last_seen_at),
            last_command_at: snapshot.last_command_at.map(rfc3339),
            last_response_at: snapshot.last_response_at.map(rfc3339),
            status: snapshot.status().to_string(),
        }
    }
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// Messages streamed to a control client, one per line.
///
/// Every response stream ends with [`ControlMessage::Exit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Progress or outcome text.
    Notice {
        /// Text to show.
        text: String,
    },
    /// Agent listing.
    Agents {
        /// Agents in admission order.
        agents: Vec<AgentSummary>,
    },
    /// Captured image.
    Image {
        /// Base64 data exactly as the agent sent it.
        payload: String,
    },
    /// Terminal failure text for a capture.
    Message {
        /// Text to show.
        text: String,
    },
    /// End of the response stream.
    Exit {
        /// Process exit status for the client.
        status: i32,
    },
}

impl ControlMessage {
    /// Creates a notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice { text: text.into() }
    }

    /// Creates a failure message.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }
}

/// Writes [`ControlMessage`] values as JSONL.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one message line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_message(&mut self, message: &ControlMessage) -> Result<(), ControlError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Writes a notice and flushes so the client sees it while it waits.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn write_notice(&mut self, text: impl Into<String>) -> Result<(), ControlError> {
        self.write_message(&ControlMessage::notice(text))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the terminating exit message and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn write_exit(&mut self, status: i32) -> Result<(), ControlError> {
        self.write_message(&ControlMessage::Exit { status })?;
        self.writer.flush()?;
        Ok(())
    }

    /// Reports a request error and ends the stream with status 1.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, error: &ControlError) -> Result<(), ControlError> {
        self.write_message(&ControlMessage::message(format!("error: {error}")))?;
        self.write_exit(1)
    }
}
