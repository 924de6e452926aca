use indexmap::IndexMap;
use log::debug;

use crate::lang::{MethodDecl, PoolKind, Program};

use super::class::{ClassData, ClassTable};
use super::config::LowerConfig;
use super::error::LowerError;
use super::memory::MemoryPool;

/// All mutable state of one compile pass.
///
/// Created by [`Compiler::compile`](super::compile::Compiler::compile),
/// threaded through every unit, and dropped when the pass ends. Units share
/// the pools so their slots never collide.
#[derive(Debug)]
pub struct Session {
    pub config: LowerConfig,
    pub global: MemoryPool,
    pub actor: MemoryPool,
    pub classes: ClassTable,
    pub class_data: ClassData,
    pub functions: IndexMap<String, MethodDecl>,
}

impl Session {
    pub fn new(config: LowerConfig, program: &Program) -> Result<Self, LowerError> {
        let classes = ClassTable::build(&program.classes)?;

        let mut functions = IndexMap::new();
        for function in &program.functions {
            if functions
                .insert(function.name.clone(), function.clone())
                .is_some()
            {
                return Err(LowerError::invariant(format!(
                    "function '{}' declared twice",
                    function.name
                ))
                .with_span(function.span));
            }
        }

        debug!(
            "session: {} classes, {} functions",
            program.classes.len(),
            functions.len()
        );

        Ok(Self {
            global: MemoryPool::new(PoolKind::Global, config.global_capacity, config.reuse_slots),
            actor: MemoryPool::new(PoolKind::Actor, config.actor_capacity, config.reuse_slots),
            config,
            classes,
            class_data: ClassData::new(),
            functions,
        })
    }

    pub fn pool(&mut self, kind: PoolKind) -> &mut MemoryPool {
        match kind {
            PoolKind::Global => &mut self.global,
            PoolKind::Actor => &mut self.actor,
        }
    }
}
