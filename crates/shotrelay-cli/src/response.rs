//! Daemon response stream handling.
//!
//! The daemon answers every request with a sequence of JSON lines that ends
//! with an `exit` message. Notices and messages go to stderr, agent listings
//! are rendered as a table on stdout, and image payloads are either printed or
//! decoded into a file.

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::render::render_agents;
use crate::{AppError, EMPTY_LINE_LIMIT, IoStreams};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum DaemonMessage {
    Notice { text: String },
    Agents { agents: Vec<AgentRow> },
    Image { payload: String },
    Message { text: String },
    Exit { status: i32 },
}

/// One agent as reported by `list`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub(crate) struct AgentRow {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) last_seen_at: String,
    #[serde(default)]
    pub(crate) last_command_at: Option<String>,
    #[serde(default)]
    pub(crate) last_response_at: Option<String>,
    pub(crate) status: String,
}

/// Controls how image payloads are surfaced.
pub(crate) struct ResponseSettings<'a> {
    /// Destination for decoded image bytes; print base64 when absent.
    pub(crate) output: Option<&'a Path>,
    /// Label used when reporting a saved image.
    pub(crate) label: &'a str,
    /// Read timeout applied to the control stream.
    pub(crate) read_timeout: Duration,
}

pub(crate) fn read_daemon_messages<R, W, E>(
    connection: &mut R,
    io: &mut IoStreams<'_, W, E>,
    settings: &ResponseSettings<'_>,
) -> Result<i32, AppError>
where
    R: Read,
    W: Write,
    E: Write,
{
    let mut reader = io::BufReader::new(connection);
    let mut line = String::new();
    let mut exit_status: Option<i32> = None;
    let mut consecutive_empty_lines = 0;

    while exit_status.is_none()
        && reader
            .read_line(&mut line)
            .map_err(|error| AppError::from_read(error, settings.read_timeout))?
            != 0
    {
        if line.trim().is_empty() {
            consecutive_empty_lines += 1;
            if consecutive_empty_lines >= EMPTY_LINE_LIMIT {
                writeln!(
                    io.stderr,
                    "Warning: received {EMPTY_LINE_LIMIT} consecutive empty lines from daemon; aborting."
                )
                .map_err(AppError::ForwardResponse)?;
                break;
            }
            line.clear();
            continue;
        }
        consecutive_empty_lines = 0;
        let message: DaemonMessage = serde_json::from_str(&line).map_err(AppError::ParseMessage)?;
        match message {
            DaemonMessage::Notice { text } | DaemonMessage::Message { text } => {
                writeln!(io.stderr, "{text}").map_err(AppError::ForwardResponse)?;
            }
            DaemonMessage::Agents { agents } => {
                render_agents(&agents, &mut *io.stdout).map_err(AppError::ForwardResponse)?;
            }
            DaemonMessage::Image { payload } => emit_image(&payload, io, settings)?,
            DaemonMessage::Exit { status } => exit_status = Some(status),
        }
        line.clear();
    }

    io.stdout.flush().map_err(AppError::ForwardResponse)?;
    io.stderr.flush().map_err(AppError::ForwardResponse)?;

    exit_status.ok_or(AppError::MissingExit)
}

fn emit_image<W, E>(
    payload: &str,
    io: &mut IoStreams<'_, W, E>,
    settings: &ResponseSettings<'_>,
) -> Result<(), AppError>
where
    W: Write,
    E: Write,
{
    let Some(path) = settings.output else {
        return writeln!(io.stdout, "{payload}").map_err(AppError::ForwardResponse);
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(AppError::DecodeImage)?;
    fs::write(path, &bytes).map_err(|source| AppError::WriteImage {
        path: path.to_path_buf(),
        source,
    })?;
    writeln!(
        io.stderr,
        "{} saved to {} ({} bytes)",
        settings.label,
        path.display(),
        bytes.len()
    )
    .map_err(AppError::ForwardResponse)
}
