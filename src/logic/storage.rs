//! Port value storage.
//!
//! Every port of a running block holds one [`PortStorage`]:
//!
//! - **Local**: a plain settable slot, written by the block's own logic or by
//!   the user's config. Starts uninitialized (reads as `AvailableLater`).
//! - **Filtered**: a local slot that runs every written value through a
//!   [`PortFilter`] first (clamp-and-step numbers, length-limited arrays).
//! - **Backed**: a read-only proxy to another block's output port. Reads
//!   delegate to the [`SignalGraph`], which recalculates the source on demand.
//!
//! Storages never fail: missing values come back as a [`ValueResult`].

use crate::id::BlockId;
use crate::logic::value::{PortValue, Tick, TickContext, TypedValue, ValueResult};
use crate::types::{PrimitiveKind, Value};

/// Read access to block outputs across the circuit.
///
/// Implemented by the circuit arena; backed storages resolve through it so
/// that a handle to a removed block degrades to `AvailableLater`.
pub trait SignalGraph {
    /// Read an output of `block`, recalculating it first if needed.
    fn output(&self, ctx: TickContext, block: BlockId, port: &str) -> PortValue;

    /// Called once each time a block's outputs turn into garbage.
    fn report_garbage(&self, _block: BlockId, _ctx: TickContext) {}
}

/// Value filter applied on every write to a filtered port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortFilter {
    /// Clamp a number to `[min, max]`, snapped to `min + k * step`.
    Clamp { min: f64, max: f64, step: Option<f64> },
    /// Truncate strings and byte arrays.
    MaxLength(usize),
}

impl PortFilter {
    /// Apply the filter. Values of kinds the filter does not know pass through.
    ///
    /// Filtering is idempotent: `apply(apply(v)) == apply(v)`.
    pub fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (PortFilter::Clamp { min, max, step }, Value::Number(n)) => {
                if !n.is_finite() || min.is_nan() || max.is_nan() || min > max {
                    return Value::Number(n);
                }
                let mut clamped = n.clamp(*min, *max);
                if let Some(step) = step.filter(|s| *s > 0.0) {
                    let mut k = ((clamped - min) / step).round();
                    // Snapping can overshoot max when the range is not a multiple of step
                    if min + k * step > *max {
                        k -= 1.0;
                    }
                    clamped = (min + k * step).clamp(*min, *max);
                }
                Value::Number(clamped)
            }
            (PortFilter::MaxLength(len), Value::ByteArray(mut bytes)) => {
                bytes.truncate(*len);
                Value::ByteArray(bytes)
            }
            (PortFilter::MaxLength(len), Value::String(s)) => {
                Value::String(s.chars().take(*len).collect())
            }
            (_, other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Uninitialized,
    Value(Value),
    Result(ValueResult),
}

/// A plain settable slot.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    stored: Stored,
    last_set_tick: Tick,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            stored: Stored::Uninitialized,
            last_set_tick: 0,
        }
    }

    pub fn get(&self, ctx: TickContext) -> PortValue {
        match &self.stored {
            Stored::Uninitialized => Err(ValueResult::AvailableLater),
            Stored::Value(value) => Ok(TypedValue::new(value.clone(), self.last_set_tick, ctx)),
            Stored::Result(result) => Err(*result),
        }
    }

    /// Store a value. Non-finite numbers are stored as garbage.
    ///
    /// Returns true if the slot turned into garbage with this write.
    pub fn set(&mut self, ctx: TickContext, value: Value) -> bool {
        if !value.is_finite() {
            return self.set_result(ctx, ValueResult::Garbage);
        }
        self.stored = Stored::Value(value);
        self.last_set_tick = ctx.tick;
        false
    }

    /// Replace the value with a read result.
    ///
    /// Returns true if the slot turned into garbage with this write.
    pub fn set_result(&mut self, ctx: TickContext, result: ValueResult) -> bool {
        let entered_garbage = result == ValueResult::Garbage && !self.is_garbage();
        self.stored = Stored::Result(result);
        self.last_set_tick = ctx.tick;
        entered_garbage
    }

    pub fn is_garbage(&self) -> bool {
        self.stored == Stored::Result(ValueResult::Garbage)
    }

    pub fn is_initialized(&self) -> bool {
        self.stored != Stored::Uninitialized
    }

    /// Kind of the stored value, if there is one.
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match &self.stored {
            Stored::Value(value) => Some(value.kind()),
            _ => None,
        }
    }

    pub fn last_set_tick(&self) -> Tick {
        self.last_set_tick
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// A local slot with a write filter.
#[derive(Debug, Clone)]
pub struct FilteredStorage {
    inner: LocalStorage,
    filter: PortFilter,
}

impl FilteredStorage {
    pub fn new(filter: PortFilter) -> Self {
        Self {
            inner: LocalStorage::new(),
            filter,
        }
    }

    pub fn set(&mut self, ctx: TickContext, value: Value) -> bool {
        let filtered = self.filter.apply(value);
        self.inner.set(ctx, filtered)
    }

    pub fn filter(&self) -> &PortFilter {
        &self.filter
    }
}

/// Read-only proxy to another block's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackedStorage {
    pub source_block: BlockId,
    pub source_port: String,
}

impl BackedStorage {
    pub fn new(source_block: BlockId, source_port: impl Into<String>) -> Self {
        Self {
            source_block,
            source_port: source_port.into(),
        }
    }

    pub fn get(&self, ctx: TickContext, graph: &dyn SignalGraph) -> PortValue {
        graph.output(ctx, self.source_block, &self.source_port)
    }
}

/// Runtime state of one port on one block.
#[derive(Debug, Clone)]
pub enum PortStorage {
    Local(LocalStorage),
    Filtered(FilteredStorage),
    Backed(BackedStorage),
}

impl PortStorage {
    /// A fresh settable storage, filtered if a filter is given.
    pub fn settable(filter: Option<&PortFilter>) -> Self {
        match filter {
            Some(filter) => PortStorage::Filtered(FilteredStorage::new(filter.clone())),
            None => PortStorage::Local(LocalStorage::new()),
        }
    }

    /// Read the current value. Backed storages pull through `graph`.
    pub fn get(&self, ctx: TickContext, graph: &dyn SignalGraph) -> PortValue {
        match self {
            PortStorage::Local(local) => local.get(ctx),
            PortStorage::Filtered(filtered) => filtered.inner.get(ctx),
            PortStorage::Backed(backed) => backed.get(ctx, graph),
        }
    }

    /// Write a value. Backed storages are read-only and ignore the write.
    ///
    /// Returns true if the port turned into garbage with this write.
    pub fn set(&mut self, ctx: TickContext, value: Value) -> bool {
        match self {
            PortStorage::Local(local) => local.set(ctx, value),
            PortStorage::Filtered(filtered) => filtered.set(ctx, value),
            PortStorage::Backed(_) => false,
        }
    }

    pub fn set_result(&mut self, ctx: TickContext, result: ValueResult) -> bool {
        match self {
            PortStorage::Local(local) => local.set_result(ctx, result),
            PortStorage::Filtered(filtered) => filtered.inner.set_result(ctx, result),
            PortStorage::Backed(_) => false,
        }
    }

    /// Kind of the locally stored value; backed storages own no value.
    pub fn local_kind(&self) -> Option<PrimitiveKind> {
        match self {
            PortStorage::Local(local) => local.kind(),
            PortStorage::Filtered(filtered) => filtered.inner.kind(),
            PortStorage::Backed(_) => None,
        }
    }

    pub fn is_backed(&self) -> bool {
        matches!(self, PortStorage::Backed(_))
    }

    pub fn backing(&self) -> Option<&BackedStorage> {
        match self {
            PortStorage::Backed(backed) => Some(backed),
            _ => None,
        }
    }
}
