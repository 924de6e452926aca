//! Statement lowering.
//!
//! A [`Translator`] turns the statements of one unit into one action list.
//! It owns the unit's scopes, loop frames and method frames; everything that
//! outlives the unit (pools, class storage) lives in the [`Session`].

use indexmap::IndexMap;
use log::{debug, warn};

use crate::action::check::check_actions;
use crate::action::{Action, ActionList, Element, SkipRef};
use crate::lang::{Branch, Expr, PoolKind, Span, Stmt, StmtKind};

use super::error::{ErrorKind, LowerError};
use super::memory::Slot;
use super::method::Region;
use super::session::Session;
use super::skip::{ContinueSkip, IfBuilder, IfChain, LoopBuilder, LoopKind};
use super::variable::{IndexedVar, RecursiveVar, Variable};

/// Slot given to variables whose allocation failed, so lowering can go on
/// and report further errors. A unit holding one is never emitted.
pub const PLACEHOLDER_SLOT: Slot = Slot::MAX;

/// Names declared by one block, and what closing it must undo.
#[derive(Debug, Default)]
pub(super) struct Scope {
    bindings: IndexMap<String, Variable>,
    /// Recursive variables pushed in this scope, in push order.
    exits: Vec<RecursiveVar>,
    /// Slots to give back when the pool reuses slots.
    owned: Vec<(PoolKind, Slot)>,
}

/// One method body being lowered (the unit itself is the outermost one).
#[derive(Debug)]
pub(super) struct Frame {
    /// Key of the method, `None` for the unit body.
    pub method: Option<String>,
    /// Names below this scope belong to the caller.
    pub lookup_floor: usize,
    /// `return` pops every scope from here up.
    pub scope_depth: usize,
    /// Loops below this belong to the caller.
    pub loop_floor: usize,
    /// Locals are stack-emulated.
    pub recursive: bool,
    pub returns: Vec<SkipRef>,
    pub ret_value: Option<IndexedVar>,
}

/// Result of lowering one unit.
#[derive(Debug)]
pub struct UnitOutput {
    pub result: Result<ActionList, LowerError>,
    /// Exhaustion errors recorded while lowering went on past them.
    pub deferred: Vec<LowerError>,
}

pub struct Translator<'s> {
    pub(super) session: &'s mut Session,
    pub(super) unit: String,
    pub(super) pool: PoolKind,
    pub(super) list: ActionList,
    pub(super) scopes: Vec<Scope>,
    pub(super) loops: ContinueSkip,
    pub(super) frames: Vec<Frame>,
    pub(super) regions: Vec<Region>,
    deferred: Vec<LowerError>,
    span: Span,
    next_hidden: usize,
}

impl<'s> Translator<'s> {
    pub fn new(session: &'s mut Session, unit: impl Into<String>, pool: PoolKind) -> Self {
        Self {
            session,
            unit: unit.into(),
            pool,
            list: ActionList::new(),
            scopes: Vec::new(),
            loops: ContinueSkip::new(),
            frames: Vec::new(),
            regions: Vec::new(),
            deferred: Vec::new(),
            span: Span::default(),
            next_hidden: 0,
        }
    }

    /// Lower a unit body into a finished action list.
    pub fn lower_unit(mut self, body: &[Stmt]) -> UnitOutput {
        let result = self.lower_unit_inner(body);
        UnitOutput {
            result,
            deferred: self.deferred,
        }
    }

    fn lower_unit_inner(&mut self, body: &[Stmt]) -> Result<ActionList, LowerError> {
        self.frames.push(Frame {
            method: None,
            lookup_floor: 0,
            scope_depth: 0,
            loop_floor: 0,
            recursive: false,
            returns: Vec::new(),
            ret_value: None,
        });
        self.open_scope();
        self.lower_stmts(body)?;
        self.close_scope()?;
        self.close_frame()?;
        self.finish()
    }

    /// Lower the initializers of every static field.
    pub fn lower_static_init(mut self) -> UnitOutput {
        let result = self.lower_static_init_inner();
        UnitOutput {
            result,
            deferred: self.deferred,
        }
    }

    fn lower_static_init_inner(&mut self) -> Result<ActionList, LowerError> {
        let statics: Vec<(String, String, Expr)> = self
            .session
            .classes
            .classes()
            .flat_map(|class| {
                class
                    .fields
                    .iter()
                    .filter(|field| field.is_static)
                    .filter_map(|field| {
                        field
                            .initial
                            .clone()
                            .map(|init| (class.name.clone(), field.name.clone(), init))
                    })
            })
            .collect();

        self.frames.push(Frame {
            method: None,
            lookup_floor: 0,
            scope_depth: 0,
            loop_floor: 0,
            recursive: false,
            returns: Vec::new(),
            ret_value: None,
        });
        self.open_scope();
        for (class, field, init) in statics {
            let value = self.lower_expr(&init)?;
            let var = self.static_var(&class, &field)?;
            self.list.extend(var.set(value, None, &[]));
        }
        self.close_scope()?;
        self.close_frame()?;
        self.finish()
    }

    fn finish(&mut self) -> Result<ActionList, LowerError> {
        if !self.scopes.is_empty() || !self.frames.is_empty() || self.loops.depth() != 0 {
            return Err(LowerError::invariant(format!(
                "unit '{}' ended with {} scopes, {} frames and {} loops open",
                self.unit,
                self.scopes.len(),
                self.frames.len(),
                self.loops.depth()
            )));
        }
        check_actions(&self.list).map_err(|err| LowerError::invariant(err.to_string()))?;
        debug!(
            "unit '{}': {} actions, {} elements",
            self.unit,
            self.list.len(),
            self.list.element_count()
        );
        Ok(std::mem::take(&mut self.list))
    }

    // =========================================================================
    // Scopes and storage
    // =========================================================================

    pub(super) fn open_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope: emit its recursive pops (last pushed first)
    /// and release its slots.
    pub(super) fn close_scope(&mut self) -> Result<(), LowerError> {
        let mut scope = self
            .scopes
            .pop()
            .ok_or_else(|| LowerError::invariant("scope closed twice"))?;
        for var in scope.exits.iter_mut().rev() {
            let pop = var.exit(None)?;
            self.list.extend(pop);
        }
        for (pool, slot) in scope.owned {
            self.session.pool(pool).free(slot)?;
        }
        Ok(())
    }

    /// Pops for leaving every scope from `depth` up, innermost first.
    pub(super) fn pending_pops(&self, depth: usize) -> Vec<Action> {
        self.scopes
            .get(depth..)
            .unwrap_or(&[])
            .iter()
            .rev()
            .flat_map(|scope| scope.exits.iter().rev())
            .flat_map(|var| var.pop_actions(None))
            .collect()
    }

    /// Emit the pops for an early exit down to `depth`. The scopes stay
    /// open: the structured path still closes them.
    pub(super) fn unwind_to(&mut self, depth: usize) {
        let pops = self.pending_pops(depth);
        self.list.extend(pops);
    }

    fn current_scope(&mut self) -> Result<&mut Scope, LowerError> {
        self.scopes
            .last_mut()
            .ok_or_else(|| LowerError::invariant("declaration outside any scope"))
    }

    pub(super) fn bind(&mut self, name: &str, variable: Variable) -> Result<(), LowerError> {
        self.current_scope()?
            .bindings
            .insert(name.to_string(), variable);
        Ok(())
    }

    pub(super) fn lookup(&self, name: &str) -> Result<Variable, LowerError> {
        let floor = self.frames.last().map_or(0, |frame| frame.lookup_floor);
        self.scopes
            .get(floor..)
            .unwrap_or(&[])
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .cloned()
            .ok_or_else(|| LowerError::invariant(format!("unresolved name '{}'", name)))
    }

    pub(super) fn hidden(&mut self, what: &str) -> String {
        self.next_hidden += 1;
        format!("__{}{}", what, self.next_hidden)
    }

    pub(super) fn in_recursive_frame(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.recursive)
    }

    /// Take a slot from `pool` for the current scope. Running out is
    /// recorded and answered with a placeholder.
    pub(super) fn allocate(&mut self, pool: PoolKind, owner: &str) -> Result<Slot, LowerError> {
        match self.session.pool(pool).allocate(owner) {
            Ok(slot) => {
                self.current_scope()?.owned.push((pool, slot));
                Ok(slot)
            }
            Err(err) if err.kind() == ErrorKind::ResourceExhausted => {
                warn!("unit '{}': {}", self.unit, err);
                self.deferred.push(err.with_span(self.span));
                Ok(PLACEHOLDER_SLOT)
            }
            Err(err) => Err(err),
        }
    }

    /// A plain variable that is not bound to a name.
    pub(super) fn temp(&mut self, what: &str) -> Result<IndexedVar, LowerError> {
        let name = self.hidden(what);
        let pool = self.pool;
        let slot = self.allocate(pool, &name)?;
        Ok(IndexedVar::new(name, pool, slot))
    }

    /// Declare `name` in the current scope. Inside a recursive frame, or
    /// when forced, the variable is a stack pushed here and popped when the
    /// scope closes.
    pub(super) fn declare(
        &mut self,
        name: &str,
        initial: Option<Element>,
        force_recursive: bool,
    ) -> Result<Variable, LowerError> {
        let pool = self.pool;
        let slot = self.allocate(pool, name)?;

        let variable = if force_recursive || self.in_recursive_frame() {
            let mut var = RecursiveVar::new(name, pool, slot);
            let push = var.enter(initial.unwrap_or_else(Element::neutral), None);
            self.list.extend(push);
            self.current_scope()?.exits.push(var.clone());
            Variable::Recursive(var)
        } else {
            let var = IndexedVar::new(name, pool, slot);
            if let Some(initial) = initial {
                self.list.extend(var.set(initial, None, &[]));
            }
            Variable::Indexed(var)
        };

        self.bind(name, variable.clone())?;
        Ok(variable)
    }

    /// Pin a value that must survive later code in a recursive frame, where
    /// plain temporaries are shared by every activation.
    pub(super) fn materialize(
        &mut self,
        value: Element,
    ) -> Result<Element, LowerError> {
        if !self.in_recursive_frame() {
            return Ok(value);
        }
        let name = self.hidden("result");
        Ok(self.declare(&name, Some(value), true)?.get())
    }

    // =========================================================================
    // Frames
    // =========================================================================

    pub(super) fn frame(&self) -> Result<&Frame, LowerError> {
        self.frames
            .last()
            .ok_or_else(|| LowerError::invariant("no method frame open"))
    }

    /// Pop the innermost frame and land its returns here.
    pub(super) fn close_frame(&mut self) -> Result<(), LowerError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| LowerError::invariant("method frame closed twice"))?;
        for skip in frame.returns {
            self.list.resolve_here(skip)?;
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(super) fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<(), LowerError> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    pub(super) fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), LowerError> {
        self.open_scope();
        self.lower_stmts(stmts)?;
        self.close_scope()
    }

    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LowerError> {
        let outer = std::mem::replace(&mut self.span, stmt.span);
        let result = self.lower_stmt_kind(&stmt.kind).map_err(|err| err.with_span(stmt.span));
        self.span = outer;
        result
    }

    fn lower_stmt_kind(&mut self, kind: &StmtKind) -> Result<(), LowerError> {
        match kind {
            StmtKind::Define {
                name,
                initial,
                recursive,
            } => {
                let initial = initial
                    .as_ref()
                    .map(|expr| self.lower_expr(expr))
                    .transpose()?;
                self.declare(name, initial, *recursive)?;
                Ok(())
            }
            StmtKind::Assign {
                target,
                index,
                op,
                value,
            } => self.lower_assign(target, index, *op, value),
            StmtKind::If {
                branches,
                otherwise,
            } => self.lower_if(branches, otherwise.as_deref()),
            StmtKind::While { condition, body } => self.lower_while(condition, body),
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => self.lower_for(init.as_deref(), condition, step.as_deref(), body),
            StmtKind::ForEach {
                element,
                index,
                array,
                body,
            } => self.lower_foreach(element, index.as_deref(), array, body),
            StmtKind::Break { depth } => self.lower_break(*depth),
            StmtKind::Continue { depth } => self.lower_continue(*depth),
            StmtKind::Return { value } => self.lower_return(value.as_ref()),
            StmtKind::Delete { object, class } => self.lower_delete(object, class),
            StmtKind::Block(body) => self.lower_block(body),
            StmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
        }
    }

    /// Lower a condition in its own scope. The scope stays open until
    /// [`close_condition`](Self::close_condition), after the guard read it.
    fn open_condition(&mut self, condition: &Expr) -> Result<Element, LowerError> {
        self.open_scope();
        self.lower_expr(condition)
    }

    /// Close the condition scope on the taken path and return the same pops
    /// for the path that skipped.
    fn close_condition(&mut self) -> Result<Vec<Action>, LowerError> {
        let tail = self.pending_pops(self.scopes.len().saturating_sub(1));
        self.close_scope()?;
        Ok(tail)
    }

    fn lower_if(&mut self, branches: &[Branch], otherwise: Option<&[Stmt]>) -> Result<(), LowerError> {
        let mut chain = IfChain::new();

        for (i, branch) in branches.iter().enumerate() {
            let condition = self.open_condition(&branch.condition)?;
            let mut builder = IfBuilder::new();
            builder.setup(&mut self.list, condition)?;
            let tail = self.close_condition()?;

            self.lower_block(&branch.body)?;

            let mut over_tail = None;
            if i + 1 < branches.len() || otherwise.is_some() {
                chain.skip_to_end(&mut self.list);
            } else if !tail.is_empty() {
                over_tail = Some(self.list.push_skip(None));
            }
            builder.finish(&mut self.list)?;
            self.list.extend(tail);
            if let Some(skip) = over_tail {
                self.list.resolve_here(skip)?;
            }
        }

        if let Some(body) = otherwise {
            self.lower_block(body)?;
        }
        chain.finish(&mut self.list)
    }

    fn lower_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), LowerError> {
        let mut builder = LoopBuilder::new(LoopKind::While);
        builder.setup(&mut self.list, &mut self.loops, self.scopes.len())?;
        let condition = self.open_condition(condition)?;
        builder.guard(&mut self.list, Some(condition))?;
        let tail = self.close_condition()?;

        self.lower_block(body)?;
        builder.finish(&mut self.list, &mut self.loops, tail)
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        condition: &Expr,
        step: Option<&Stmt>,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        self.open_scope();
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }

        let mut builder = LoopBuilder::new(LoopKind::For);
        builder.setup(&mut self.list, &mut self.loops, self.scopes.len())?;
        let condition = self.open_condition(condition)?;
        builder.guard(&mut self.list, Some(condition))?;
        let tail = self.close_condition()?;

        self.lower_block(body)?;
        builder.epilogue(&mut self.list, &mut self.loops)?;
        if let Some(step) = step {
            self.lower_block(std::slice::from_ref(step))?;
        }
        builder.finish(&mut self.list, &mut self.loops, tail)?;
        self.close_scope()
    }

    fn lower_foreach(
        &mut self,
        element: &str,
        index: Option<&str>,
        array: &Expr,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        let array = self.lower_expr(array)?;

        self.open_scope();
        let index_name = match index {
            Some(name) => name.to_string(),
            None => self.hidden("index"),
        };
        let index = self.declare(&index_name, None, false)?;

        let mut builder = LoopBuilder::new(LoopKind::ForEach { array, index });
        builder.setup(&mut self.list, &mut self.loops, self.scopes.len())?;
        builder.guard(&mut self.list, None)?;
        let current = builder
            .element()
            .ok_or_else(|| LowerError::invariant("foreach loop without an element"))?;

        self.open_scope();
        self.bind(element, Variable::Reference(current))?;
        self.lower_stmts(body)?;
        self.close_scope()?;

        builder.finish(&mut self.list, &mut self.loops, Vec::new())?;
        self.close_scope()
    }

    fn lower_break(&mut self, depth: u32) -> Result<(), LowerError> {
        let floor = self.frame()?.loop_floor;
        let scope_depth = self.loops.frame(depth, floor, "break")?.scope_depth;
        self.unwind_to(scope_depth);
        let skip = self.list.push_skip(None);
        self.loops.add_break(depth, floor, skip)
    }

    fn lower_continue(&mut self, depth: u32) -> Result<(), LowerError> {
        let floor = self.frame()?.loop_floor;
        let scope_depth = self.loops.frame(depth, floor, "continue")?.scope_depth;
        self.unwind_to(scope_depth);
        let skip = self.list.push_skip(None);
        self.loops.add_continue(depth, floor, skip)
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), LowerError> {
        let value = value.map(|expr| self.lower_expr(expr)).transpose()?;

        let frame = self.frame()?;
        let scope_depth = frame.scope_depth;
        if let (Some(value), Some(ret)) = (value, frame.ret_value.clone()) {
            self.list.extend(ret.set(value, None, &[]));
        }

        self.unwind_to(scope_depth);
        let skip = self.list.push_skip(None);
        self.frames
            .last_mut()
            .ok_or_else(|| LowerError::invariant("return outside any frame"))?
            .returns
            .push(skip);
        Ok(())
    }
}
