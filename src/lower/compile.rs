//! Program driver.
//!
//! Lowers every rule of a [`Program`] against one fresh [`Session`]. Slot
//! numbers are only meaningful inside the session that assigned them, so the
//! driver retains whole programs: when any unit of a pass fails, the last
//! program that lowered cleanly is shipped in its place.

use indexmap::IndexSet;
use log::{debug, info, warn};

use crate::action::CompiledProgram;
use crate::lang::{PoolKind, Program};

use super::config::LowerConfig;
use super::error::{Diagnostic, LowerError};
use super::session::Session;
use super::translate::{Translator, UnitOutput};

/// Unit holding the initializers of static fields.
pub const STATIC_INIT_UNIT: &str = "__static_init";

/// Result of one compile pass.
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub program: CompiledProgram,
    pub diagnostics: Vec<Diagnostic>,
    /// Elements over every emitted unit.
    pub element_count: usize,
    /// Units shipped from a previous pass because this one had failures.
    /// Empty when `program` was lowered by this pass.
    pub stale: Vec<String>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug, Default)]
pub struct Compiler {
    config: LowerConfig,
    retained: Option<CompiledProgram>,
}

impl Compiler {
    pub fn new(config: LowerConfig) -> Self {
        Self {
            config,
            retained: None,
        }
    }

    pub fn config(&self) -> &LowerConfig {
        &self.config
    }

    /// The last program every unit of which lowered without errors.
    pub fn retained(&self) -> Option<&CompiledProgram> {
        self.retained.as_ref()
    }

    pub fn compile(&mut self, program: &Program) -> CompileOutput {
        let mut output = CompileOutput::default();

        let mut session = match Session::new(self.config.clone(), program) {
            Ok(session) => session,
            Err(err) => {
                warn!("program rejected: {}", err);
                output.diagnostics.push(Diagnostic::from_error("<program>", &err));
                self.fall_back(CompiledProgram::new(), &mut output);
                return output;
            }
        };

        let mut lowered = CompiledProgram::new();
        let mut failed = 0;

        let has_static_init = program
            .classes
            .iter()
            .flat_map(|class| &class.fields)
            .any(|field| field.is_static && field.initial.is_some());
        if has_static_init {
            let unit = Translator::new(&mut session, STATIC_INIT_UNIT, PoolKind::Global)
                .lower_static_init();
            if !accept(STATIC_INIT_UNIT, unit, &mut lowered, &mut output) {
                failed += 1;
            }
        }

        let mut seen = IndexSet::new();
        for rule in &program.rules {
            if !seen.insert(rule.name.as_str()) {
                let err = LowerError::invariant(format!("rule '{}' declared twice", rule.name));
                output.diagnostics.push(Diagnostic::from_error(&rule.name, &err));
                failed += 1;
                continue;
            }
            let unit = Translator::new(&mut session, rule.name.as_str(), rule.pool)
                .lower_unit(&rule.body);
            if !accept(&rule.name, unit, &mut lowered, &mut output) {
                failed += 1;
            }
        }

        if failed == 0 {
            self.retained = Some(lowered.clone());
            output.program = lowered;
            output.element_count = output.program.element_count();
        } else {
            self.fall_back(lowered, &mut output);
        }

        if output.element_count > self.config.element_ceiling {
            let message = format!(
                "program uses {} elements, over the ceiling of {}",
                output.element_count, self.config.element_ceiling
            );
            warn!("{}", message);
            output
                .diagnostics
                .push(Diagnostic::warning("<program>", message));
        }

        info!(
            "compiled {} units ({} failed, {} stale), {} elements, {} global / {} actor slots",
            output.program.units.len(),
            failed,
            output.stale.len(),
            output.element_count,
            session.global.high_water(),
            session.actor.high_water()
        );
        output
    }

    /// Ships the retained program if there is one. Otherwise ships the units
    /// of this pass that did lower, which at least share one slot layout.
    fn fall_back(&self, partial: CompiledProgram, output: &mut CompileOutput) {
        match &self.retained {
            Some(previous) => {
                debug!("shipping the previous program ({} units)", previous.units.len());
                output.program = previous.clone();
                output.stale = previous.units.keys().cloned().collect();
            }
            None => output.program = partial,
        }
        output.element_count = output.program.element_count();
    }
}

/// Records the diagnostics of one unit and keeps its list if it lowered
/// cleanly. Returns whether it did.
fn accept(
    unit: &str,
    lowered: UnitOutput,
    program: &mut CompiledProgram,
    output: &mut CompileOutput,
) -> bool {
    let UnitOutput { result, deferred } = lowered;
    for err in &deferred {
        output.diagnostics.push(Diagnostic::from_error(unit, err));
    }

    match result {
        Ok(list) if deferred.is_empty() => {
            debug!("unit '{}' accepted", unit);
            program.units.insert(unit.to_string(), list);
            true
        }
        Ok(_) => false,
        Err(err) => {
            warn!("unit '{}' failed: {}", unit, err);
            output.diagnostics.push(Diagnostic::from_error(unit, &err));
            false
        }
    }
}
