//! ConstantBlock: forwards its configured value to `result`.

use crate::error::Result;
use crate::logic::{BlockBehavior, BlockLogic};

pub struct ConstantBlock;

impl ConstantBlock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConstantBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBehavior for ConstantBlock {
    fn block_type(&self) -> &str {
        "constant"
    }

    fn install(&self, logic: &mut BlockLogic) -> Result<()> {
        logic.on_recalc_inputs_or_fill(&["value"], |inputs, outputs| {
            match inputs.value("value") {
                Some(value) => outputs.set("result", value.clone()),
                None => outputs.unset("result"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::logic::Circuit;
    use crate::types::Value;
    use glam::DVec3;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_constant_forwards_config() {
        let mut circuit = Circuit::new(Arc::new(Catalog::builtin().unwrap()));
        let value = Value::Vector3(DVec3::new(1.0, 2.0, 3.0));
        let config = BTreeMap::from([("value".to_string(), value.clone())]);
        let id = circuit.place("c".into(), "constant", &config).unwrap();

        circuit.step();
        assert_eq!(circuit.get_output(id, "result").unwrap().value, value);
    }

    #[test]
    fn test_unconfigured_constant_uses_default_kind() {
        let mut circuit = Circuit::new(Arc::new(Catalog::builtin().unwrap()));
        let id = circuit.place("c".into(), "constant", &BTreeMap::new()).unwrap();

        circuit.step();
        assert_eq!(circuit.get_output(id, "result").unwrap().value, Value::Bool(false));
    }
}
