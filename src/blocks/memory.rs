//! MemoryBlock: latches `value` into `result` while `set` is true.
//!
//! The latched value survives ticks where `set` is false; it is only lost if
//! an input becomes unavailable.

use crate::error::Result;
use crate::logic::{BlockBehavior, BlockLogic};

pub struct MemoryBlock;

impl MemoryBlock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MemoryBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBehavior for MemoryBlock {
    fn block_type(&self) -> &str {
        "memory"
    }

    fn install(&self, logic: &mut BlockLogic) -> Result<()> {
        logic.on_recalc_inputs_or_fill(&["value", "set"], |inputs, outputs| {
            if inputs.bool("set") != Some(true) {
                return;
            }
            if let Some(value) = inputs.value("value") {
                outputs.set("result", value.clone());
            }
        })
    }
}
