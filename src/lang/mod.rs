//! # Cinder input tree
//!
//! This module defines the scope-resolved, type-checked program tree that a
//! front end hands to the lowering, plus the runtime [`value::Value`] model of
//! the target engine.
//!
//! ## Conventions
//!
//! - Every name in the tree is already resolved; lowering maps names onto
//!   storage slots, it never reports "undefined" to users.
//! - `class` fields on field accesses, calls and deletes carry the *static*
//!   type. Dispatch never looks at the runtime type.

pub mod class;
pub mod node;
pub mod program;
pub mod value;

pub use class::{ClassDecl, ConstructorDecl, FieldDecl, MethodDecl};
pub use node::{AssignOp, BinaryOp, Branch, Expr, Place, PoolKind, Rule, Span, Stmt, StmtKind};
pub use program::Program;
pub use value::Value;
