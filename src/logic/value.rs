//! Typed port values and the non-value read results.

use crate::types::{PrimitiveKind, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic simulation tick.
pub type Tick = u64;

/// Per-read context: which tick the read belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickContext {
    pub tick: Tick,
}

impl TickContext {
    pub fn new(tick: Tick) -> Self {
        Self { tick }
    }
}

/// The value a port holds during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    /// Tick the value was last written on.
    pub set_tick: Tick,
    /// True only during the tick the value was set on.
    pub changed_this_tick: bool,
}

impl TypedValue {
    /// A value written on `set_tick`, as read during `ctx`.
    pub fn new(value: Value, set_tick: Tick, ctx: TickContext) -> Self {
        Self {
            value,
            set_tick,
            changed_this_tick: set_tick == ctx.tick,
        }
    }

    /// Whether the value was written after `tick`.
    pub fn newer_than(&self, tick: Option<Tick>) -> bool {
        tick.map_or(true, |t| self.set_tick > t)
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.value.kind()
    }
}

/// Why a port has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueResult {
    /// Nothing produced yet; callers treat this as "no signal".
    AvailableLater,
    /// Recalculation hit a cycle or a non-finite number.
    Garbage,
}

impl ValueResult {
    /// Combine two results; garbage wins.
    pub fn merge(self, other: ValueResult) -> ValueResult {
        if self == ValueResult::Garbage || other == ValueResult::Garbage {
            ValueResult::Garbage
        } else {
            ValueResult::AvailableLater
        }
    }
}

impl fmt::Display for ValueResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueResult::AvailableLater => write!(f, "available later"),
            ValueResult::Garbage => write!(f, "garbage"),
        }
    }
}

/// Result of reading a port.
pub type PortValue = std::result::Result<TypedValue, ValueResult>;
