//! Block catalog: static block definitions plus the behaviors that drive them.
//!
//! A [`Catalog`] is built once at startup through a [`CatalogBuilder`] and
//! shared read-only (behind an `Arc`) by every circuit. Building validates
//! every definition, so a misconfigured catalog fails here rather than when a
//! block is first placed.
//!
//! # Example
//!
//! ```ignore
//! use block_logic::catalog::CatalogBuilder;
//!
//! let catalog = CatalogBuilder::new()
//!     .load_toml_str(include_str!("../../assets/catalog.toml"))?
//!     .with_behaviors(block_logic::blocks::builtin_behaviors())
//!     .build()?;
//! ```

pub mod definition;
pub mod loader;

pub use definition::{BlockDefinition, PortDefinition};
pub use loader::{BlockSpec, CatalogFile, PortSpec};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CircuitError, Result};
use crate::logic::BlockBehavior;

/// The builtin catalog shipped with the crate.
pub const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog.toml");

/// Immutable registry of block types.
pub struct Catalog {
    definitions: BTreeMap<String, Arc<BlockDefinition>>,
    behaviors: BTreeMap<String, Arc<dyn BlockBehavior>>,
}

impl Catalog {
    /// The builtin block set with its behaviors.
    pub fn builtin() -> Result<Self> {
        CatalogBuilder::new()
            .load_toml_str(BUILTIN_CATALOG)?
            .with_behaviors(crate::blocks::builtin_behaviors())
            .build()
    }

    pub fn definition(&self, block_type: &str) -> Option<Arc<BlockDefinition>> {
        self.definitions.get(block_type).cloned()
    }

    pub fn behavior(&self, block_type: &str) -> Option<&Arc<dyn BlockBehavior>> {
        self.behaviors.get(block_type)
    }

    /// Block type ids in sorted order.
    pub fn block_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("block_types", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects definitions and behaviors, then validates them into a [`Catalog`].
#[derive(Default)]
pub struct CatalogBuilder {
    definitions: Vec<BlockDefinition>,
    behaviors: Vec<Box<dyn BlockBehavior>>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definition(mut self, definition: BlockDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_behavior(mut self, behavior: Box<dyn BlockBehavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn with_behaviors(mut self, behaviors: Vec<Box<dyn BlockBehavior>>) -> Self {
        self.behaviors.extend(behaviors);
        self
    }

    /// Add every block from a TOML catalog document.
    pub fn load_toml_str(mut self, content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| CircuitError::Catalog(format!("Failed to parse catalog: {}", e)))?;
        for block in file.blocks {
            self.definitions.push(block.into_definition()?);
        }
        Ok(self)
    }

    /// Add every block from a TOML catalog file.
    pub fn load_toml_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CircuitError::Catalog(format!("Failed to read catalog {:?}: {}", path, e))
        })?;
        self.load_toml_str(&content)
    }

    pub fn build(self) -> Result<Catalog> {
        let mut definitions = BTreeMap::new();
        for definition in self.definitions {
            definition.validate()?;
            let id = definition.id.clone();
            if definitions.insert(id.clone(), Arc::new(definition)).is_some() {
                return Err(CircuitError::Catalog(format!("Duplicate block type {}", id)));
            }
        }

        let mut behaviors: BTreeMap<String, Arc<dyn BlockBehavior>> = BTreeMap::new();
        for behavior in self.behaviors {
            let block_type = behavior.block_type().to_string();
            if !definitions.contains_key(&block_type) {
                return Err(CircuitError::Catalog(format!(
                    "Behavior registered for undefined block type {}",
                    block_type
                )));
            }
            behaviors.insert(block_type, Arc::from(behavior));
        }

        tracing::info!(
            "Catalog loaded: {} block types, {} with behaviors",
            definitions.len(),
            behaviors.len()
        );

        Ok(Catalog {
            definitions,
            behaviors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        for block_type in ["constant", "and", "or", "xor", "not", "add", "sub", "mul", "div", "memory"] {
            assert!(
                catalog.definition(block_type).is_some(),
                "missing {}",
                block_type
            );
            assert!(catalog.behavior(block_type).is_some(), "no behavior for {}", block_type);
        }
    }

    #[test]
    fn test_duplicate_block_type_rejected() {
        let def = BlockDefinition::new("a")
            .with_output(PortDefinition::new("result", [PrimitiveKind::Bool]));
        let result = CatalogBuilder::new()
            .with_definition(def.clone())
            .with_definition(def)
            .build();
        assert!(matches!(result, Err(CircuitError::Catalog(_))));
    }

    #[test]
    fn test_invalid_definition_fails_build() {
        let def = BlockDefinition::new("bad").with_input(
            PortDefinition::new("v", [PrimitiveKind::Bool]).with_default_kind(PrimitiveKind::Key),
        );
        let result = CatalogBuilder::new().with_definition(def).build();
        assert!(matches!(
            result,
            Err(CircuitError::DefaultKindNotAccepted { .. })
        ));
    }

    #[test]
    fn test_behavior_without_definition_rejected() {
        let result = CatalogBuilder::new()
            .with_behaviors(crate::blocks::builtin_behaviors())
            .build();
        assert!(result.is_err());
    }
}
