//! CLI argument definitions for the `shotrelay` operator tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Operator front end for the screenshot relay daemon.
#[derive(Parser, Debug)]
#[command(name = "shotrelay", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Action to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operator actions, one control request each.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Asks an agent for a screenshot and waits for it.
    Capture {
        /// Agent id; any connected agent when omitted.
        #[arg(value_name = "AGENT")]
        agent: Option<String>,
        /// Writes the decoded image here instead of printing base64.
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Lists connected agents and their request status.
    Agents,
    /// Closes an agent's connection.
    Disconnect {
        /// Agent id.
        #[arg(value_name = "AGENT")]
        agent: String,
    },
}
