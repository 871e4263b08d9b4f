//! Static port and block definitions.
//!
//! Definitions are authored once per block type and shared read-only by all
//! instances of that type.

use crate::error::{CircuitError, Result};
use crate::id::PortDirection;
use crate::logic::PortFilter;
use crate::types::{ConfigType, KindSet, PrimitiveKind, Value};

/// Static descriptor for one port of a block type.
#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub name: String,
    pub display_name: String,
    pub accepted_kinds: KindSet,
    pub default_kind: PrimitiveKind,
    /// Ports of one block sharing a group narrow together.
    pub group: Option<String>,
    pub hidden: bool,
    pub config_type: Option<ConfigType>,
    pub filter: Option<PortFilter>,
    /// Value an unwired, unconfigured input starts with.
    pub default_value: Option<Value>,
}

impl PortDefinition {
    /// A port accepting `kinds`, defaulting to the first of them.
    pub fn new(name: impl Into<String>, kinds: impl IntoIterator<Item = PrimitiveKind>) -> Self {
        let kinds: Vec<_> = kinds.into_iter().collect();
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            accepted_kinds: kinds.iter().copied().collect(),
            default_kind: kinds.first().copied().unwrap_or(PrimitiveKind::Unset),
            group: None,
            hidden: false,
            config_type: None,
            filter: None,
            default_value: None,
        }
    }

    pub fn with_default_kind(mut self, kind: PrimitiveKind) -> Self {
        self.default_kind = kind;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_filter(mut self, filter: PortFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// The value an unwired input holds before any config is applied.
    pub fn initial_value(&self) -> Option<Value> {
        self.default_value
            .clone()
            .or_else(|| self.default_kind.default_value())
    }

    /// Check the port's invariants. `block` is only used in the error.
    pub fn validate(&self, block: &str) -> Result<()> {
        if !self.accepted_kinds.has(self.default_kind) {
            return Err(CircuitError::DefaultKindNotAccepted {
                block: block.to_string(),
                port: self.name.clone(),
                kind: self.default_kind,
            });
        }
        if let Some(value) = &self.default_value {
            if !self.accepted_kinds.has(value.kind()) {
                return Err(CircuitError::Catalog(format!(
                    "Port {}.{}: default value of kind {} is not accepted",
                    block,
                    self.name,
                    value.kind()
                )));
            }
        }
        if let Some(config_type) = self.config_type {
            if !self.accepted_kinds.has(config_type.kind()) {
                return Err(CircuitError::Catalog(format!(
                    "Port {}.{}: config type {} is not an accepted kind",
                    block, self.name, config_type
                )));
            }
        }
        Ok(())
    }
}

/// Static definition of a block type: its ordered input and output ports.
#[derive(Debug, Clone)]
pub struct BlockDefinition {
    pub id: String,
    pub display_name: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl BlockDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, port: PortDefinition) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortDefinition) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn ports(&self, direction: PortDirection) -> &[PortDefinition] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub fn port_index(&self, direction: PortDirection, name: &str) -> Option<usize> {
        self.ports(direction).iter().position(|p| p.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&PortDefinition> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDefinition> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Ports (of either direction) sharing `group`.
    pub fn group_members<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (PortDirection, &'a PortDefinition)> + 'a {
        let inputs = self.inputs.iter().map(|p| (PortDirection::Input, p));
        let outputs = self.outputs.iter().map(|p| (PortDirection::Output, p));
        inputs
            .chain(outputs)
            .filter(move |(_, p)| p.group.as_deref() == Some(group))
    }

    /// Validate every port. A failure is a misconfigured catalog.
    pub fn validate(&self) -> Result<()> {
        for direction in [PortDirection::Input, PortDirection::Output] {
            let ports = self.ports(direction);
            for (i, port) in ports.iter().enumerate() {
                port.validate(&self.id)?;
                if ports[..i].iter().any(|p| p.name == port.name) {
                    return Err(CircuitError::Catalog(format!(
                        "Block {} declares port {} twice",
                        self.id, port.name
                    )));
                }
            }
        }
        Ok(())
    }
}
