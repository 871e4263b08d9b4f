//! Boolean logic gates.

use crate::error::Result;
use crate::logic::{BlockBehavior, BlockLogic};
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOp {
    And,
    Or,
    Xor,
    Not,
}

impl GateOp {
    pub fn block_type(&self) -> &'static str {
        match self {
            GateOp::And => "and",
            GateOp::Or => "or",
            GateOp::Xor => "xor",
            GateOp::Not => "not",
        }
    }

    fn apply(&self, a: bool, b: bool) -> bool {
        match self {
            GateOp::And => a && b,
            GateOp::Or => a || b,
            GateOp::Xor => a != b,
            GateOp::Not => !a,
        }
    }
}

/// One- or two-input gate writing a bool `result`.
pub struct GateBlock {
    op: GateOp,
}

impl GateBlock {
    pub fn new(op: GateOp) -> Self {
        Self { op }
    }

    pub fn op(&self) -> GateOp {
        self.op
    }
}

impl BlockBehavior for GateBlock {
    fn block_type(&self) -> &str {
        self.op.block_type()
    }

    fn install(&self, logic: &mut BlockLogic) -> Result<()> {
        let op = self.op;
        if op == GateOp::Not {
            return logic.on_recalc_inputs_or_fill(&["value"], move |inputs, outputs| {
                match inputs.bool("value") {
                    Some(a) => outputs.set("result", Value::Bool(op.apply(a, false))),
                    None => outputs.unset("result"),
                }
            });
        }

        logic.on_recalc_inputs_or_fill(&["value1", "value2"], move |inputs, outputs| {
            match (inputs.bool("value1"), inputs.bool("value2")) {
                (Some(a), Some(b)) => outputs.set("result", Value::Bool(op.apply(a, b))),
                _ => outputs.unset("result"),
            }
        })
    }
}
