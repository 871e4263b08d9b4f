//! Test data builders for creating plots

use block_logic::{PlacedBlock, PlotSnapshot, Value};

/// Builder for plot snapshots
pub struct PlotBuilder {
    blocks: Vec<PlacedBlock>,
}

impl PlotBuilder {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// A block with no config
    pub fn block(mut self, uuid: &str, block_type: &str) -> Self {
        self.blocks.push(PlacedBlock::new(uuid, block_type));
        self
    }

    /// A constant block holding `value`
    pub fn constant(self, uuid: &str, value: Value) -> Self {
        self.block(uuid, "constant").value("value", value)
    }

    /// Configure an input of the last added block
    pub fn value(mut self, port: &str, value: Value) -> Self {
        if let Some(block) = self.blocks.pop() {
            self.blocks.push(block.with_value(port, value));
        }
        self
    }

    /// Wire `from.from_port` into an input of the last added block
    pub fn wire(mut self, port: &str, from: &str, from_port: &str) -> Self {
        if let Some(block) = self.blocks.pop() {
            self.blocks.push(block.with_wire(port, from, from_port));
        }
        self
    }

    pub fn build(self) -> PlotSnapshot {
        PlotSnapshot {
            blocks: self.blocks,
        }
    }
}

impl Default for PlotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_builder() {
        let plot = PlotBuilder::new()
            .constant("a", Value::Bool(true))
            .block("n", "not")
            .wire("value", "a", "result")
            .build();

        assert_eq!(plot.blocks.len(), 2);
        assert_eq!(plot.blocks[1].wires().count(), 1);
        assert_eq!(plot.blocks[0].values().len(), 1);
    }
}
