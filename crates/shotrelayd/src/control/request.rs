//! Control request parsing.

use serde::Deserialize;

use super::errors::ControlError;

/// Operator command carried by one request line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Ask an agent, or any agent, for a screenshot.
    Capture {
        /// Target agent id.
        #[serde(default)]
        agent: Option<String>,
    },
    /// List connected agents.
    List,
    /// Close an agent's connection.
    Disconnect {
        /// Agent id.
        agent: String,
    },
}

impl ControlRequest {
    /// Parses one request line, ignoring surrounding whitespace.
    ///
    /// A blank capture target counts as no target.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Malformed`] for empty lines or JSON that does
    /// not describe a known command.
    pub fn parse(line: &[u8]) -> Result<Self, ControlError> {
        let text = std::str::from_utf8(line)
            .map_err(|_| ControlError::malformed("request is not valid UTF-8"))?
            .trim();
        if text.is_empty() {
            return Err(ControlError::malformed("empty request line"));
        }
        let request: Self = serde_json::from_str(text).map_err(ControlError::from_json_error)?;
        Ok(match request {
            Self::Capture { agent } => Self::Capture {
                agent: agent
                    .map(|id| id.trim().to_owned())
                    .filter(|id| !id.is_empty()),
            },
            Self::Disconnect { agent } => Self::Disconnect {
                agent: agent.trim().to_owned(),
            },
            Self::List => Self::List,
        })
    }
}
