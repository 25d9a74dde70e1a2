//! Test support utilities for CLI behavioural coverage.
//!
//! Supplies harness types for starting fake daemons and capturing CLI output
//! so step definitions and unit tests remain focused on their assertions.

mod fake_daemon;

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use rstest::fixture;
use serde_json::json;
use shotrelay_config::{Config, SocketEndpoint};
use tempfile::TempDir;

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

pub(super) use fake_daemon::FakeDaemon;

/// Base64 of the four-byte JPEG stub the fake daemon returns.
pub(super) const IMAGE_PAYLOAD: &str = "/9j/AA==";

/// A config loader that returns a fixed configuration for tests.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Test world holding CLI state, daemon instance, and captured output.
#[derive(Default)]
pub(super) struct TestWorld {
    pub config: Config,
    pub daemon: Option<FakeDaemon>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
    pub requests: Vec<String>,
    pub output_dir: Option<TempDir>,
}

impl TestWorld {
    pub fn start_daemon_with_lines(&mut self, lines: Vec<String>) -> Result<()> {
        let daemon = FakeDaemon::spawn(lines)?;
        self.config.control_socket = SocketEndpoint::tcp("127.0.0.1", daemon.port());
        self.daemon = Some(daemon);
        Ok(())
    }

    /// Points the CLI at a port nothing listens on.
    pub fn point_at_closed_port(&mut self) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind throwaway listener")?;
        let port = listener.local_addr().context("throwaway address")?.port();
        drop(listener);
        self.config.control_socket = SocketEndpoint::tcp("127.0.0.1", port);
        Ok(())
    }

    pub fn prepare_output_dir(&mut self) -> Result<()> {
        self.output_dir = Some(tempfile::tempdir().context("create output dir")?);
        Ok(())
    }

    pub fn output_path(&self, name: &str) -> Result<PathBuf> {
        let dir = self.output_dir.as_ref().context("output dir prepared")?;
        Ok(dir.path().join(name))
    }

    pub fn run(&mut self, command: &str) -> Result<()> {
        let args = Self::build_args(command);
        self.run_args(args)
    }

    pub fn run_args(&mut self, args: Vec<OsString>) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        self.requests.clear();
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut io = IoStreams::new(&mut self.stdout, &mut self.stderr);
        let exit = run_with_loader(args, &mut io, &loader);
        self.exit_code = Some(exit);
        if let Some(daemon) = self.daemon.as_mut() {
            self.requests = daemon.take_requests()?;
        }
        self.daemon = None;
        Ok(())
    }

    pub fn build_args(command: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("shotrelay")];
        args.extend(
            command
                .split_whitespace()
                .map(|token| OsString::from(token.trim_matches('"'))),
        );
        args
    }

    pub fn stdout_text(&self) -> Result<String> {
        decode_utf8(self.stdout.clone(), "stdout")
    }

    pub fn stderr_text(&self) -> Result<String> {
        decode_utf8(self.stderr.clone(), "stderr")
    }

    pub fn assert_exit_code(&self, expected: u8) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(
            exit == ExitCode::from(expected),
            "expected exit code {expected}, got {exit:?}"
        );
        Ok(())
    }

    pub fn assert_single_request(&self, expected: &str) -> Result<()> {
        ensure!(
            self.requests.len() == 1,
            "expected single request but found {}",
            self.requests.len()
        );
        let actual = self.requests.first().context("request missing")?;
        ensure!(
            actual.trim_end() == expected,
            "request mismatch: expected {expected:?}, got {actual:?}"
        );
        Ok(())
    }

    pub fn saved_image(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.output_path(name)?;
        fs::read(&path).with_context(|| format!("read {}", path.display()))
    }
}

pub(super) fn decode_utf8(buffer: Vec<u8>, label: &str) -> Result<String> {
    String::from_utf8(buffer).with_context(|| format!("{label} utf8"))
}

pub(super) fn capture_lines() -> Vec<String> {
    vec![
        json!({"kind": "notice", "text": "capture request sent to desk; awaiting response"})
            .to_string(),
        json!({"kind": "image", "payload": IMAGE_PAYLOAD}).to_string(),
        json!({"kind": "exit", "status": 0}).to_string(),
    ]
}

pub(super) fn agents_lines() -> Vec<String> {
    let agents = json!([
        {
            "id": "a1b2c3d4e5f6a7b8",
            "display_name": "desk",
            "last_seen_at": "2026-03-01T10:00:00Z",
            "last_command_at": "2026-03-01T10:00:01Z",
            "last_response_at": null,
            "status": "awaiting response (10:00:01)"
        },
        {
            "id": "ffeeddccbbaa0099",
            "display_name": "lab",
            "last_seen_at": "2026-03-01T09:59:00Z",
            "last_command_at": null,
            "last_response_at": null,
            "status": "idle"
        }
    ]);
    vec![
        json!({"kind": "agents", "agents": agents}).to_string(),
        json!({"kind": "exit", "status": 0}).to_string(),
    ]
}

pub(super) fn unknown_agent_lines(id: &str) -> Vec<String> {
    vec![
        json!({"kind": "notice", "text": format!("unknown agent '{id}'")}).to_string(),
        json!({"kind": "exit", "status": 1}).to_string(),
    ]
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
