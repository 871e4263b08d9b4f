//! Polymorphic arithmetic blocks.
//!
//! `value1`, `value2` and `result` share the `value` group, so a wire narrows
//! all three to one kind together. Operands of differing kinds leave the
//! result unset. Non-finite results are stored as garbage by the output
//! storage; byte division by zero reports garbage directly.

use glam::DVec3;

use crate::error::Result;
use crate::logic::{BlockBehavior, BlockLogic, ValueResult};
use crate::types::{Color, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn block_type(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
        }
    }

    fn number(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Sub => a - b,
            ArithmeticOp::Mul => a * b,
            ArithmeticOp::Div => a / b,
        }
    }

    fn vector(&self, a: DVec3, b: DVec3) -> DVec3 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Sub => a - b,
            ArithmeticOp::Mul => a * b,
            ArithmeticOp::Div => a / b,
        }
    }

    fn byte(&self, a: u8, b: u8) -> Option<u8> {
        match self {
            ArithmeticOp::Add => Some(a.wrapping_add(b)),
            ArithmeticOp::Sub => Some(a.wrapping_sub(b)),
            ArithmeticOp::Mul => Some(a.wrapping_mul(b)),
            ArithmeticOp::Div => a.checked_div(b),
        }
    }

    /// Apply the operator to two values of the same kind.
    pub fn apply(&self, a: &Value, b: &Value) -> std::result::Result<Value, ValueResult> {
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(self.number(*a, *b))),
            (Value::Vector3(a), Value::Vector3(b)) => Ok(Value::Vector3(self.vector(*a, *b))),
            (Value::Color(a), Value::Color(b)) => {
                let channel = |x: f32, y: f32| self.number(x as f64, y as f64) as f32;
                Ok(Value::Color(Color::new(
                    channel(a.r, b.r),
                    channel(a.g, b.g),
                    channel(a.b, b.b),
                )))
            }
            (Value::Byte(a), Value::Byte(b)) => {
                self.byte(*a, *b).map(Value::Byte).ok_or(ValueResult::Garbage)
            }
            _ => Err(ValueResult::AvailableLater),
        }
    }
}

pub struct ArithmeticBlock {
    op: ArithmeticOp,
}

impl ArithmeticBlock {
    pub fn new(op: ArithmeticOp) -> Self {
        Self { op }
    }

    pub fn op(&self) -> ArithmeticOp {
        self.op
    }
}

impl BlockBehavior for ArithmeticBlock {
    fn block_type(&self) -> &str {
        self.op.block_type()
    }

    fn install(&self, logic: &mut BlockLogic) -> Result<()> {
        let op = self.op;
        logic.on_recalc_inputs_or_fill(&["value1", "value2"], move |inputs, outputs| {
            let (Some(a), Some(b)) = (inputs.value("value1"), inputs.value("value2")) else {
                outputs.unset("result");
                return;
            };
            match op.apply(a, b) {
                Ok(value) => outputs.set("result", value),
                Err(result) => outputs.set_result("result", result),
            }
        })
    }
}
