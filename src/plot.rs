//! Plot snapshots: the placed blocks of one plot and how their ports are set.
//!
//! Each input port of a placed block is either configured with a value or
//! wired to another block's output:
//!
//! ```json
//! {
//!   "blocks": [
//!     { "uuid": "a", "type": "constant", "config": { "value": { "kind": "bool", "value": true } } },
//!     { "uuid": "c", "type": "not", "config": { "value": { "block": "a", "port": "result" } } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CircuitError, Result};
use crate::id::BlockUuid;
use crate::types::Value;

/// Reference to the output port an input is wired to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRef {
    pub block: BlockUuid,
    pub port: String,
}

/// Persisted config of one input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortConfig {
    Wire(WireRef),
    Value(Value),
}

/// One block placed on the plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBlock {
    pub uuid: BlockUuid,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub config: BTreeMap<String, PortConfig>,
}

impl PlacedBlock {
    pub fn new(uuid: impl Into<BlockUuid>, block_type: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            block_type: block_type.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, port: impl Into<String>, value: Value) -> Self {
        self.config.insert(port.into(), PortConfig::Value(value));
        self
    }

    pub fn with_wire(
        mut self,
        port: impl Into<String>,
        block: impl Into<BlockUuid>,
        source_port: impl Into<String>,
    ) -> Self {
        self.config.insert(
            port.into(),
            PortConfig::Wire(WireRef {
                block: block.into(),
                port: source_port.into(),
            }),
        );
        self
    }

    /// Configured input values, without wires.
    pub fn values(&self) -> BTreeMap<String, Value> {
        self.config
            .iter()
            .filter_map(|(port, config)| match config {
                PortConfig::Value(value) => Some((port.clone(), value.clone())),
                PortConfig::Wire(_) => None,
            })
            .collect()
    }

    /// `(input port, source)` for every wired input.
    pub fn wires(&self) -> impl Iterator<Item = (&str, &WireRef)> {
        self.config.iter().filter_map(|(port, config)| match config {
            PortConfig::Wire(wire) => Some((port.as_str(), wire)),
            PortConfig::Value(_) => None,
        })
    }
}

/// Every block placed on a plot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotSnapshot {
    #[serde(default)]
    pub blocks: Vec<PlacedBlock>,
}

impl PlotSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: PlacedBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn block(&self, uuid: &BlockUuid) -> Option<&PlacedBlock> {
        self.blocks.iter().find(|b| &b.uuid == uuid)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| CircuitError::Serialization(format!("Failed to parse plot: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CircuitError::Serialization(format!("Failed to read plot file {:?}: {}", path, e))
        })?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            CircuitError::Serialization(format!("Failed to write plot file {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_and_wires() {
        let plot = PlotSnapshot::from_json(
            r#"{
                "blocks": [
                    { "uuid": "a", "type": "constant",
                      "config": { "value": { "kind": "bool", "value": true } } },
                    { "uuid": "c", "type": "not",
                      "config": { "value": { "block": "a", "port": "result" } } }
                ]
            }"#,
        )
        .unwrap();

        let a = plot.block(&"a".into()).unwrap();
        assert_eq!(a.values().get("value"), Some(&Value::Bool(true)));
        assert_eq!(a.wires().count(), 0);

        let c = plot.block(&"c".into()).unwrap();
        let wires: Vec<_> = c.wires().collect();
        assert_eq!(wires.len(), 1);
        assert_eq!(wires[0].0, "value");
        assert_eq!(wires[0].1.block, BlockUuid::new("a"));
        assert!(c.values().is_empty());
    }

    #[test]
    fn test_missing_config_defaults_empty() {
        let plot = PlotSnapshot::from_json(r#"{ "blocks": [ { "uuid": "x", "type": "and" } ] }"#)
            .unwrap();
        assert!(plot.blocks[0].config.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("plot.json");
        let plot = PlotSnapshot::new()
            .with_block(PlacedBlock::new("a", "constant").with_value("value", Value::Number(2.5)))
            .with_block(PlacedBlock::new("b", "not").with_wire("value", "a", "result"));

        plot.save(&path).unwrap();
        assert_eq!(PlotSnapshot::load(&path).unwrap(), plot);
    }
}
