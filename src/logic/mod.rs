//! Tick-driven evaluation engine.
//!
//! - [`value`] - typed port values and the `AvailableLater`/`Garbage` results
//! - [`storage`] - per-port storages (local, filtered, backed by another block)
//! - [`block`] - running block instances and their reactions
//! - [`circuit`] - the block arena and the per-tick sweep
//! - [`tick`] - the monotonically increasing tick counter

pub mod block;
pub mod circuit;
pub mod storage;
pub mod tick;
pub mod value;

pub use block::{BlockBehavior, BlockLogic, Inputs, Outputs, PortSlot, RecalcState};
pub use circuit::{Circuit, CircuitEvent};
pub use storage::{
    BackedStorage, FilteredStorage, LocalStorage, PortFilter, PortStorage, SignalGraph,
};
pub use tick::TickDriver;
pub use value::{PortValue, Tick, TickContext, TypedValue, ValueResult};
