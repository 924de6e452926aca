//! Target instruction model: pure value [`element::Element`]s, effectful
//! [`op::Action`]s, and the append-only [`ir::ActionList`] a unit compiles to.

pub mod check;
pub mod disasm;
pub mod element;
pub mod ir;
pub mod op;

pub use element::{ArithOp, CompareOp, Element, SLICE_REST, Store};
pub use ir::{ActionList, CompiledProgram, SkipRef};
pub use op::Action;
