//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;
use shotrelay_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Secret every test configuration shares with its agents.
pub const AUTH_TOKEN: &str = "secret123";

/// Loader for a relay on ephemeral loopback ports with a control socket under
/// a temporary directory.
pub struct TestConfigLoader {
    socket_dir: Arc<TempDir>,
    max_clients: usize,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_clients(10)
    }

    #[must_use]
    pub fn with_max_clients(max_clients: usize) -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            socket_dir: Arc::new(dir),
            max_clients,
        }
    }

    /// Path of the control socket.
    #[must_use]
    pub fn control_path(&self) -> PathBuf {
        self.socket_dir.path().join("run").join("shotrelayd.sock")
    }

    /// Configuration handed out by [`ConfigLoader::load`].
    #[must_use]
    pub fn config(&self) -> Config {
        let path = self.control_path();
        let path = path
            .to_str()
            .expect("temporary socket path was not valid UTF-8");
        Config {
            agent_host: "127.0.0.1".to_owned(),
            agent_port: 0,
            auth_token: AUTH_TOKEN.to_owned(),
            max_clients: self.max_clients,
            control_socket: SocketEndpoint::unix(path),
            log_filter: "shotrelayd=debug".to_owned(),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("shotrelayd"),
            OsString::from("--control-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
