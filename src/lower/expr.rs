//! Expression, assignment and instance lowering.
//!
//! Expressions become pure elements. Anything with an effect (calls, `new`)
//! emits its actions into the list first and yields an element that reads
//! the result.

use crate::action::Element;
use crate::lang::{AssignOp, Expr, Place, PoolKind};

use super::error::LowerError;
use super::translate::{Frame, Translator};
use super::variable::{IndexedVar, Variable};

impl Translator<'_> {
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<Element, LowerError> {
        match expr {
            Expr::Number(n) => Ok(Element::Number(*n)),
            Expr::Bool(b) => Ok(Element::Bool(*b)),
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.lower_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Element::Array(items))
            }
            Expr::Var(name) => Ok(self.lookup(name)?.get()),
            Expr::Index { array, index } => {
                let array = self.lower_expr(array)?;
                let index = self.lower_expr(index)?;
                Ok(array.value_in_array(index))
            }
            Expr::Field {
                object,
                class,
                field,
            } => {
                let handle = self.lower_expr(object)?;
                Ok(self.field_var(class, field, handle)?.get(None))
            }
            Expr::StaticField { class, field } => Ok(self.static_var(class, field)?.get(None)),
            Expr::ActorVar { actor, name } => {
                let var = self.actor_var(name)?;
                let actor = self.lower_expr(actor)?;
                Ok(var.get_for(Some(&actor)))
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                Ok(Element::binary(*op, lhs, rhs))
            }
            Expr::Not(inner) => Ok(self.lower_expr(inner)?.negate()),
            Expr::Negate(inner) => Ok(Element::number(0.0).subtract(self.lower_expr(inner)?)),
            Expr::Length(inner) => Ok(self.lower_expr(inner)?.count_of()),
            Expr::New {
                class,
                constructor,
                args,
            } => self.lower_new(class, *constructor, args),
            Expr::Call {
                class,
                method,
                object,
                args,
            } => self.lower_call(class.as_deref(), method, object.as_deref(), args),
            Expr::This => Ok(self.lookup("this")?.get()),
            Expr::CurrentActor => Ok(Element::EventPlayer),
        }
    }

    fn lower_all(&mut self, exprs: &[Expr]) -> Result<Vec<Element>, LowerError> {
        exprs.iter().map(|expr| self.lower_expr(expr)).collect()
    }

    // =========================================================================
    // Storage of instances and statics
    // =========================================================================

    /// The field stack of `class.field`, narrowed to `handle`.
    pub(super) fn field_var(
        &mut self,
        class: &str,
        field: &str,
        handle: Element,
    ) -> Result<IndexedVar, LowerError> {
        let session = &mut *self.session;
        let stack = session.classes.find_field(class, field)?.stack;
        session
            .class_data
            .prepare(&mut session.global, session.classes.layout(class)?)?;
        let stack = session.class_data.field_stack(&mut session.global, stack)?;
        Ok(stack.child(handle))
    }

    pub(super) fn static_var(&mut self, class: &str, field: &str) -> Result<IndexedVar, LowerError> {
        let session = &mut *self.session;
        let (owner, _) = session.classes.find_static(class, field)?;
        let owner = owner.to_string();
        session
            .class_data
            .static_field(&mut session.global, &owner, field)
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    pub(super) fn lower_assign(
        &mut self,
        target: &Place,
        index: &[Expr],
        op: AssignOp,
        value: &Expr,
    ) -> Result<(), LowerError> {
        let index = self.lower_all(index)?;

        match target {
            Place::Var(name) => {
                let var = self.lookup(name)?;
                let value = self.lower_expr(value)?;
                let value = combine(op, var.get(), &index, value);
                let actions = var.set(name, value, &index)?;
                self.list.extend(actions);
            }
            Place::Field {
                object,
                class,
                field,
            } => {
                let handle = self.lower_expr(object)?;
                let var = self.field_var(class, field, handle)?;
                let value = self.lower_expr(value)?;
                let value = combine(op, var.get(None), &index, value);
                self.list.extend(var.set(value, None, &index));
            }
            Place::StaticField { class, field } => {
                let var = self.static_var(class, field)?;
                let value = self.lower_expr(value)?;
                let value = combine(op, var.get(None), &index, value);
                self.list.extend(var.set(value, None, &index));
            }
            Place::ActorVar { actor, name } => {
                let var = self.actor_var(name)?;
                let actor = self.lower_expr(actor)?;
                let value = self.lower_expr(value)?;
                let value = combine(op, var.get_for(Some(&actor)), &index, value);
                let actions = var.set_for(name, value, Some(&actor), &index)?;
                self.list.extend(actions);
            }
        }
        Ok(())
    }

    /// `name` resolved for access through another actor's store.
    fn actor_var(&self, name: &str) -> Result<Variable, LowerError> {
        let var = self.lookup(name)?;
        match var.pool() {
            Some(PoolKind::Actor) => Ok(var),
            _ => Err(LowerError::unsupported(
                format!("actor access to '{}'", name),
                "only per-actor variables have a copy per actor",
            )),
        }
    }

    // =========================================================================
    // new / delete
    // =========================================================================

    /// Acquire a handle, initialize every field base first, then run the
    /// constructor inline with `this` bound to the handle.
    pub(super) fn lower_new(
        &mut self,
        class: &str,
        constructor: usize,
        args: &[Expr],
    ) -> Result<Element, LowerError> {
        let args = self.lower_all(args)?;
        let ctor = self.session.classes.constructor(class, constructor)?;
        if ctor.params.len() != args.len() {
            return Err(LowerError::invariant(format!(
                "constructor #{} of '{}' takes {} arguments, got {}",
                constructor,
                class,
                ctor.params.len(),
                args.len()
            )));
        }

        let fields: Vec<(u32, Option<Expr>)> = {
            let classes = &self.session.classes;
            classes
                .all_fields(class)?
                .into_iter()
                .map(|slot| Ok((slot.stack, classes.field_decl(slot)?.initial.clone())))
                .collect::<Result<_, LowerError>>()?
        };

        let name = self.hidden("new");
        let handle = self.declare(&name, None, false)?;
        {
            let session = &mut *self.session;
            session
                .class_data
                .prepare(&mut session.global, session.classes.layout(class)?)?;
            session.class_data.acquire_handle(
                &mut session.global,
                &session.config,
                &handle,
                &mut self.list,
            )?;
        }
        let this = handle.get();

        // Initializers see `this` and nothing of the caller.
        let depth = self.scopes.len();
        let recursive = self.in_recursive_frame();
        self.open_scope();
        self.frames.push(Frame {
            method: None,
            lookup_floor: depth,
            scope_depth: depth,
            loop_floor: self.loops.depth(),
            recursive,
            returns: Vec::new(),
            ret_value: None,
        });
        self.bind("this", Variable::Reference(this.clone()))?;
        for (stack, initial) in fields {
            let value = match initial {
                Some(expr) => self.lower_expr(&expr)?,
                None => Element::neutral(),
            };
            let session = &mut *self.session;
            let stack = session.class_data.field_stack(&mut session.global, stack)?;
            self.list.extend(stack.set(value, None, &[this.clone()]));
        }
        self.close_scope()?;
        self.close_frame()?;

        let key = format!("{}.new#{}", class, constructor);
        self.inline_body(&key, &ctor.params, &ctor.body, Some(this.clone()), args, None)?;
        Ok(this)
    }

    pub(super) fn lower_delete(&mut self, object: &Expr, class: &str) -> Result<(), LowerError> {
        let handle = self.lower_expr(object)?;
        let name = self.hidden("delete");
        let handle = self.declare(&name, Some(handle), false)?.get();

        let session = &mut *self.session;
        session.class_data.release(
            &mut session.global,
            &session.classes,
            class,
            handle,
            &mut self.list,
        )
    }
}

/// The value a compound assignment writes: `current[index...] op value`.
fn combine(op: AssignOp, current: Element, index: &[Element], value: Element) -> Element {
    match op.binary() {
        None => value,
        Some(op) => {
            let current = index
                .iter()
                .fold(current, |array, i| array.value_in_array(i.clone()));
            Element::binary(op, current, value)
        }
    }
}
