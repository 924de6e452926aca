//! Reference engine: executes compiled action lists against the global and
//! per-actor stores the way the target does.

pub mod engine;
pub mod runtime_error;

pub use engine::{DEFAULT_ACTOR, Engine, EngineConfig, Outcome};
pub use runtime_error::RuntimeError;
