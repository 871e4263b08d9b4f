//! Wire compatibility and kind narrowing across a placed plot.

pub mod events;
pub mod manager;
pub mod marker;

pub use events::MarkerEvent;
pub use manager::WireManager;
pub use marker::Marker;
