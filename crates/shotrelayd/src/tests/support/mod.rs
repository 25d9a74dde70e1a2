//! Test harness utilities for the daemon behavioural suites.

mod agent_client;
mod config_loader;
mod relay_world;
mod reporter;
mod world;

pub use agent_client::{Greeting, TestAgent};
pub use config_loader::{AUTH_TOKEN, TestConfigLoader};
pub use relay_world::RelayWorld;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
