//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::runtime::Runtime;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon in the foreground until a termination signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, listener startup, or shutdown fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &SystemShutdownSignal,
    )
}

/// Runs the daemon with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, listener startup, or shutdown fails.
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    let runtime = Runtime::start(&daemon)?;
    info!(
        target: PROCESS_TARGET,
        agent_addr = ?runtime.agent_addr(),
        "daemon running"
    );
    let waited = shutdown.wait();
    runtime.stop()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
