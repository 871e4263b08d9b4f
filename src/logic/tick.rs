//! Tick driver.
//!
//! Owns the monotonically increasing tick counter. Recalculation is pull
//! driven, so advancing the tick is all this does; every memoized value and
//! "changed this tick" flag is keyed off the counter.

use crate::logic::value::{Tick, TickContext};

/// Monotonic tick counter. Starts at 0; the first simulated tick is 1.
#[derive(Debug, Default, Clone)]
pub struct TickDriver {
    tick: Tick,
}

impl TickDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next tick and return it.
    pub fn tick(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn context(&self) -> TickContext {
        TickContext::new(self.tick)
    }
}
