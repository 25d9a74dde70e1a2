//! Control requests sent to the daemon.

use std::io::Write;

use serde::Serialize;

use crate::AppError;
use crate::cli::Command;

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub(crate) enum ControlRequest {
    Capture { agent: Option<String> },
    List,
    Disconnect { agent: String },
}

impl From<&Command> for ControlRequest {
    fn from(command: &Command) -> Self {
        match command {
            Command::Capture { agent, .. } => Self::Capture {
                agent: agent.clone(),
            },
            Command::Agents => Self::List,
            Command::Disconnect { agent } => Self::Disconnect {
                agent: agent.clone(),
            },
        }
    }
}

impl ControlRequest {
    pub(crate) fn write_jsonl<W>(&self, writer: &mut W) -> Result<(), AppError>
    where
        W: Write,
    {
        serde_json::to_writer(&mut *writer, self).map_err(AppError::SerialiseRequest)?;
        writer.write_all(b"\n").map_err(AppError::SendRequest)?;
        writer.flush().map_err(AppError::SendRequest)
    }
}
