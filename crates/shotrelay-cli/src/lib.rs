//! Operator command-line front end for the screenshot relay.
//!
//! The module owns argument parsing, configuration bootstrapping, request
//! serialisation, and the control socket exchange. The interface is designed
//! to be exercised both from the binary entrypoint and from tests where
//! configuration loading and IO streams can be substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use shotrelay_config::Config;

mod cli;
mod config;
mod errors;
mod render;
mod request;
mod response;
mod transport;

use cli::{Cli, Command};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use request::ControlRequest;
use response::{ResponseSettings, read_daemon_messages};
use transport::{ControlStream, read_timeout};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the configuration flags
/// the CLI reads from `shotrelay-config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--control-socket",
    "--command-prefix",
    "--log-filter",
    "--log-format",
];
const EMPTY_LINE_LIMIT: usize = 10;

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = Cli::try_parse_from(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| execute(&cli.command, &config, self.io));

        match result {
            Ok(status) => exit_code_from_status(status),
            Err(AppError::CliUsage(error)) => report_usage(&error, self.io),
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if let Some(rest) = args.get(split.command_start..) {
        cli_arguments.extend(rest.iter().cloned());
    }
    cli_arguments
}

fn execute<W, E>(
    command: &Command,
    config: &Config,
    io: &mut IoStreams<'_, W, E>,
) -> Result<i32, AppError>
where
    W: Write,
    E: Write,
{
    let mut connection = ControlStream::open(config)?;
    ControlRequest::from(command).write_jsonl(&mut connection)?;

    let output = match command {
        Command::Capture { output, .. } => output.as_deref(),
        Command::Agents | Command::Disconnect { .. } => None,
    };
    let settings = ResponseSettings {
        output,
        label: config.command_prefix(),
        read_timeout: read_timeout(config),
    };
    read_daemon_messages(&mut connection, io, &settings)
}

fn report_usage<W, E>(error: &clap::Error, io: &mut IoStreams<'_, W, E>) -> ExitCode
where
    W: Write,
    E: Write,
{
    let rendered = error.render().to_string();
    let written = if error.use_stderr() {
        write!(io.stderr, "{rendered}")
    } else {
        write!(io.stdout, "{rendered}")
    };
    if written.is_err() {
        return ExitCode::FAILURE;
    }
    exit_code_from_status(error.exit_code())
}

fn exit_code_from_status(status: i32) -> ExitCode {
    u8::try_from(status).map_or(ExitCode::FAILURE, ExitCode::from)
}
