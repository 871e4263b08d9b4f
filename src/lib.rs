//! # block-logic: Tick-driven block logic circuits
//!
//! A small reactive dataflow runtime. Blocks (gates, arithmetic, memory)
//! are connected by typed wires and re-evaluated every simulation tick.
//!
//! ## Architecture
//!
//! - **Types**: the closed set of signal kinds and their payloads
//! - **Catalog**: static block definitions loaded from TOML, plus behaviors
//! - **Logic**: pull-based evaluation; each block recalculates at most once
//!   per tick and cycles resolve to `Garbage` instead of recursing
//! - **Wire**: markers that narrow polymorphic ports to a common kind as
//!   wires are connected, and widen again on disconnect
//! - **Simulation**: keeps the circuit and the markers in sync and runs ticks
//!
//! ## Example
//!
//! ```ignore
//! use block_logic::{Catalog, EngineConfig, PlotSnapshot, Simulation};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(Catalog::builtin()?);
//! let plot = PlotSnapshot::load("plot.json")?;
//! let mut sim = Simulation::from_snapshot(catalog, EngineConfig::default(), &plot)?;
//!
//! sim.step();
//! for (block, ports) in sim.read_outputs() {
//!     println!("{block}: {ports:?}");
//! }
//! ```

pub mod blocks;
pub mod catalog;
pub mod config;
pub mod error;
pub mod id;
pub mod logic;
pub mod plot;
pub mod simulation;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use catalog::{BlockDefinition, Catalog, CatalogBuilder, PortDefinition};
pub use config::EngineConfig;
pub use error::{CircuitError, Result};
pub use id::{BlockId, BlockUuid, MarkerId, PortDirection, PortRef};
pub use logic::{Circuit, CircuitEvent, PortValue, TypedValue, ValueResult};
pub use plot::{PlacedBlock, PlotSnapshot, PortConfig};
pub use simulation::{PortReading, Simulation};
pub use types::{kind_of, Color, ConfigType, KindSet, PrimitiveKind, Value};
pub use wire::{MarkerEvent, WireManager};
