//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use block_logic::{
    Catalog, EngineConfig, PortRef, Simulation, TypedValue, ValueResult,
};
use std::sync::Arc;

/// The builtin catalog, shared.
pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().expect("builtin catalog loads"))
}

/// Config that never sleeps between ticks.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        tick_rate_hz: 0,
        ..Default::default()
    }
}

/// An empty simulation over the builtin catalog.
pub fn simulation() -> Simulation {
    Simulation::new(catalog(), fast_config())
}

pub fn port(block: &str, name: &str) -> PortRef {
    PortRef::new(block, name)
}

/// Read an output that is expected to hold a value.
pub fn output(sim: &Simulation, block: &str, name: &str) -> TypedValue {
    sim.get_output(&port(block, name))
        .unwrap_or_else(|r| panic!("{}.{} is {}", block, name, r))
}

/// Read an output that is expected to be unavailable.
pub fn unavailable(sim: &Simulation, block: &str, name: &str) -> ValueResult {
    match sim.get_output(&port(block, name)) {
        Ok(v) => panic!("{}.{} unexpectedly holds {:?}", block, name, v),
        Err(r) => r,
    }
}
