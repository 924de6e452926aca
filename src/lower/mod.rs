//! Lowering of a resolved [`Program`](crate::lang::Program) into action lists.
//!
//! Layers, leaves first:
//!
//! - [`memory`]: slot allocation in the global and per-actor stores
//! - [`variable`]: indexed and stack-emulated variables on top of slots
//! - [`skip`]: patchable skips, `if` / loop builders, loop frames
//! - [`class`]: field layout and instance storage
//! - [`session`]: the state shared by every unit of one pass
//! - `translate`, `expr`, `method`: statements, expressions and calls
//! - [`compile`]: the driver that keeps the last program that lowered cleanly

pub mod class;
pub mod compile;
pub mod config;
pub mod error;
mod expr;
pub mod memory;
mod method;
pub mod session;
pub mod skip;
pub mod translate;
pub mod variable;


pub use compile::{CompileOutput, Compiler, STATIC_INIT_UNIT};
pub use config::LowerConfig;
pub use error::{Diagnostic, ErrorKind, LowerError, Severity};
pub use translate::{PLACEHOLDER_SLOT, Translator, UnitOutput};
