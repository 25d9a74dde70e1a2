//! BDD test world for the bootstrap scenarios.

use std::cell::RefCell;
use std::sync::Arc;

use shotrelay_config::Config;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, bootstrap_with};
use crate::runtime::Runtime;

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across bootstrap steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    runtime: Option<Runtime>,
    stopped: bool,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            runtime: None,
            stopped: false,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
    }

    /// Installs a loader whose configuration carries no auth token.
    pub fn use_tokenless_loader(&mut self) {
        let config = Config {
            auth_token: String::new(),
            ..TestConfigLoader::new().config()
        };
        self.loader = Box::new(StaticConfigLoader::new(config));
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Starts listeners for the bootstrapped daemon.
    pub fn start_runtime(&mut self) {
        let daemon = self.daemon.as_ref().expect("daemon bootstrapped");
        self.runtime = Some(Runtime::start(daemon).expect("runtime starts"));
    }

    /// Stops the runtime started by [`Self::start_runtime`].
    pub fn stop_runtime(&mut self) {
        let runtime = self.runtime.take().expect("runtime running");
        runtime.stop().expect("runtime stops cleanly");
        self.stopped = true;
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the bootstrapped daemon, if any.
    #[must_use]
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    /// Whether the runtime was stopped.
    #[must_use]
    pub const fn stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.stop();
        }
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
