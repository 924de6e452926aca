//! # Cinder
//!
//! Lowers structured programs (blocks, loops, variables, classes, statically
//! resolved calls) into flat action lists for a target that only executes
//! instructions in order, skips relative distances, and stores values in a
//! global and a per-actor slot store.

pub mod action;
pub mod lang;
pub mod lower;
pub mod runtime;
