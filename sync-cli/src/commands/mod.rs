//! CLI command implementations.

pub mod demo;
pub mod session;
pub mod status;

use setpoint_sync_client::{SimulatedAuthority, SyncEngine};
use std::sync::Arc;

use crate::config::Config;

/// The engine every command drives.
pub type Engine = SyncEngine<SimulatedAuthority>;

/// Build the engine and simulated device from configuration.
pub fn build_engine(config: &Config) -> Arc<Engine> {
    Arc::new(SyncEngine::new(
        config.engine.to_engine_config(),
        SimulatedAuthority::new(config.simulator.to_simulator_config()),
    ))
}
