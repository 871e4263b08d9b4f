//! TOML catalog schema.
//!
//! ```toml
//! [[blocks]]
//! id = "add"
//! display_name = "Add"
//!
//! [[blocks.inputs]]
//! name = "value1"
//! types = ["number", "vector3", "color", "byte"]
//! group = "value"
//! ```

use serde::{Deserialize, Serialize};

use super::definition::{BlockDefinition, PortDefinition};
use crate::error::{CircuitError, Result};
use crate::logic::PortFilter;
use crate::types::{ConfigType, PrimitiveKind, Value};

/// Top level of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

/// One `[[blocks]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortSpec>,
    #[serde(default)]
    pub outputs: Vec<PortSpec>,
}

/// One `[[blocks.inputs]]` / `[[blocks.outputs]]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSpec {
    pub name: String,
    pub display_name: Option<String>,
    /// Accepted kinds; the first is the default unless `default` is given.
    pub types: Vec<PrimitiveKind>,
    pub default: Option<PrimitiveKind>,
    pub default_value: Option<Value>,
    pub config_type: Option<String>,
    pub group: Option<String>,
    pub hidden: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub max_length: Option<usize>,
}

impl BlockSpec {
    pub fn into_definition(self) -> Result<BlockDefinition> {
        let mut definition = BlockDefinition::new(&self.id);
        if let Some(display_name) = self.display_name {
            definition.display_name = display_name;
        }
        for port in self.inputs {
            definition.inputs.push(port.into_definition(&self.id)?);
        }
        for port in self.outputs {
            definition.outputs.push(port.into_definition(&self.id)?);
        }
        Ok(definition)
    }
}

impl PortSpec {
    pub fn into_definition(self, block: &str) -> Result<PortDefinition> {
        if self.types.is_empty() {
            return Err(CircuitError::Catalog(format!(
                "Port {}.{} accepts no types",
                block, self.name
            )));
        }

        let config_type = self
            .config_type
            .as_deref()
            .map(str::parse::<ConfigType>)
            .transpose()?;
        let filter = self.filter(block, config_type)?;

        let mut port = PortDefinition::new(self.name, self.types);
        if let Some(display_name) = self.display_name {
            port.display_name = display_name;
        }
        if let Some(default) = self.default {
            port.default_kind = default;
        }
        port.default_value = self.default_value;
        port.config_type = config_type;
        port.group = self.group;
        port.hidden = self.hidden;
        port.filter = filter;
        Ok(port)
    }

    fn filter(&self, block: &str, config_type: Option<ConfigType>) -> Result<Option<PortFilter>> {
        let missing = |field: &str| {
            CircuitError::Catalog(format!(
                "Port {}.{}: {} requires `{}`",
                block,
                self.name,
                config_type.map_or("filter", |t| t.name()),
                field
            ))
        };

        let filter = match config_type {
            Some(ConfigType::ClampedNumber) => Some(PortFilter::Clamp {
                min: self.min.ok_or_else(|| missing("min"))?,
                max: self.max.ok_or_else(|| missing("max"))?,
                step: self.step,
            }),
            Some(ConfigType::MotorRotationSpeed | ConfigType::ServoMotorAngle | ConfigType::Thrust) => {
                let max = self.max.ok_or_else(|| missing("max"))?;
                Some(PortFilter::Clamp {
                    min: self.min.unwrap_or(-max),
                    max,
                    step: self.step,
                })
            }
            Some(ConfigType::ByteArray | ConfigType::String) => {
                self.max_length.map(PortFilter::MaxLength)
            }
            _ => None,
        };

        if let Some(PortFilter::Clamp { min, max, step }) = &filter {
            let finite = min.is_finite() && max.is_finite() && step.map_or(true, f64::is_finite);
            if !finite {
                return Err(CircuitError::Catalog(format!(
                    "Port {}.{}: min, max and step must be finite",
                    block, self.name
                )));
            }
            if min > max {
                return Err(CircuitError::Catalog(format!(
                    "Port {}.{}: min {} is greater than max {}",
                    block, self.name, min, max
                )));
            }
        }
        Ok(filter)
    }
}
