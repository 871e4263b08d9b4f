//! Built-in block behaviors.
//!
//! Each behavior only registers reactions; ports and accepted kinds come from
//! the catalog definition of the same block type.

pub mod arithmetic;
pub mod constant;
pub mod gate;
pub mod memory;

pub use arithmetic::{ArithmeticBlock, ArithmeticOp};
pub use constant::ConstantBlock;
pub use gate::{GateBlock, GateOp};
pub use memory::MemoryBlock;

use crate::logic::BlockBehavior;

/// Behaviors for every block type in the builtin catalog.
pub fn builtin_behaviors() -> Vec<Box<dyn BlockBehavior>> {
    vec![
        Box::new(ConstantBlock::new()),
        Box::new(GateBlock::new(GateOp::And)),
        Box::new(GateBlock::new(GateOp::Or)),
        Box::new(GateBlock::new(GateOp::Xor)),
        Box::new(GateBlock::new(GateOp::Not)),
        Box::new(ArithmeticBlock::new(ArithmeticOp::Add)),
        Box::new(ArithmeticBlock::new(ArithmeticOp::Sub)),
        Box::new(ArithmeticBlock::new(ArithmeticOp::Mul)),
        Box::new(ArithmeticBlock::new(ArithmeticOp::Div)),
        Box::new(MemoryBlock::new()),
    ]
}
