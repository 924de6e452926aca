//! Statically resolved calls.
//!
//! A plain method is inlined at every call. A method marked `recursive` is
//! laid out once per outermost call as a subroutine region:
//!
//! ```text
//!         push params, this, ret_addr = -1
//! body:   <body>                      ; recursive calls skip back here
//! epilogue:
//!         addr = top(ret_addr)
//!         pop ret_addr, this, params
//!         SkipIf(addr != 0, 1)
//!         Skip → continuation of call site 0
//!         ...                         ; one pair per call site
//! ```
//!
//! A recursive call site parks its arguments in temporaries, pushes a new
//! frame with its own id as return address, skips back to the body, and
//! resumes right after that skip when the epilogue dispatches to it.

use log::debug;

use crate::action::{Action, CompareOp, Element};
use crate::lang::{Expr, Stmt};

use super::error::LowerError;
use super::translate::{Frame, Translator};
use super::variable::{IndexedVar, RecursiveVar, Variable};

/// A recursive method whose region is being emitted.
#[derive(Debug)]
pub(super) struct Region {
    key: String,
    body_start: usize,
    params: Vec<RecursiveVar>,
    this: Option<RecursiveVar>,
    ret_addr: RecursiveVar,
    arg_temps: Vec<IndexedVar>,
    this_temp: Option<IndexedVar>,
    ret_value: IndexedVar,
    /// Continuation of each recursive call site; the index is its id.
    call_sites: Vec<usize>,
}

impl Translator<'_> {
    pub(super) fn lower_call(
        &mut self,
        class: Option<&str>,
        method: &str,
        object: Option<&Expr>,
        args: &[Expr],
    ) -> Result<Element, LowerError> {
        let (key, decl) = match class {
            None => {
                let decl = self.session.functions.get(method).cloned().ok_or_else(|| {
                    LowerError::invariant(format!("unknown function '{}'", method))
                })?;
                (method.to_string(), decl)
            }
            Some(class) => {
                let (owner, decl) = self.session.classes.find_method(class, method)?;
                (format!("{}.{}", owner, method), decl.clone())
            }
        };

        if decl.params.len() != args.len() {
            return Err(LowerError::invariant(format!(
                "'{}' takes {} arguments, got {}",
                key,
                decl.params.len(),
                args.len()
            )));
        }

        let receiver = match (class, decl.is_static, object) {
            (Some(_), false, Some(object)) => Some(self.lower_expr(object)?),
            (Some(_), false, None) => Some(self.lookup("this")?.get()),
            _ => None,
        };
        let args = args
            .iter()
            .map(|arg| self.lower_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let result = if decl.recursive {
            match self.regions.iter().rposition(|region| region.key == key) {
                Some(region) => self.recursive_call(region, receiver, args)?,
                None => self.recursive_region(&key, &decl.params, &decl.body, receiver, args)?,
            }
        } else {
            if self
                .frames
                .iter()
                .any(|frame| frame.method.as_deref() == Some(key.as_str()))
            {
                return Err(LowerError::unsupported(
                    format!("call to '{}'", key),
                    "a method that is not marked recursive calls itself",
                ));
            }
            let ret = self.temp("ret")?;
            self.inline_body(&key, &decl.params, &decl.body, receiver, args, Some(ret.clone()))?;
            ret.get(None)
        };

        self.materialize(result)
    }

    /// `this` for an inlined body. A plain read can be bound directly;
    /// anything else is computed once into a variable.
    fn bind_this(&mut self, this: Element) -> Result<(), LowerError> {
        let stable = match &this {
            Element::Variable { .. } | Element::Number(_) => true,
            Element::LastOf(inner) => matches!(**inner, Element::Variable { .. }),
            _ => false,
        };
        if stable {
            self.bind("this", Variable::Reference(this))
        } else {
            self.declare("this", Some(this), false).map(|_| ())
        }
    }

    /// Lower a body in place with its parameters bound to `args`. Returns
    /// land after the parameter scope is popped.
    pub(super) fn inline_body(
        &mut self,
        key: &str,
        params: &[String],
        body: &[Stmt],
        receiver: Option<Element>,
        args: Vec<Element>,
        ret: Option<IndexedVar>,
    ) -> Result<(), LowerError> {
        let depth = self.scopes.len();
        let recursive = self.in_recursive_frame();
        self.open_scope();
        self.frames.push(Frame {
            method: Some(key.to_string()),
            lookup_floor: depth,
            scope_depth: depth,
            loop_floor: self.loops.depth(),
            recursive,
            returns: Vec::new(),
            ret_value: ret,
        });

        if let Some(this) = receiver {
            self.bind_this(this)?;
        }
        for (param, arg) in params.iter().zip(args) {
            self.declare(param, Some(arg), false)?;
        }
        self.lower_block(body)?;

        self.close_scope()?;
        self.close_frame()
    }

    fn declare_recursive(&mut self, name: &str, initial: Element) -> Result<RecursiveVar, LowerError> {
        match self.declare(name, Some(initial), true)? {
            Variable::Recursive(var) => Ok(var),
            other => Err(LowerError::invariant(format!(
                "'{}' declared recursive but bound as {:?}",
                name, other
            ))),
        }
    }

    /// Emit the region of a recursive method for an outermost call.
    fn recursive_region(
        &mut self,
        key: &str,
        params: &[String],
        body: &[Stmt],
        receiver: Option<Element>,
        args: Vec<Element>,
    ) -> Result<Element, LowerError> {
        let ret = self.temp("ret")?;
        let addr = self.temp("addr")?;

        let depth = self.scopes.len();
        let loop_floor = self.loops.depth();
        self.open_scope();

        let mut param_vars = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            param_vars.push(self.declare_recursive(param, arg)?);
        }
        let this = match receiver {
            Some(receiver) => Some(self.declare_recursive("this", receiver)?),
            None => None,
        };
        let ret_addr_name = self.hidden("ret_addr");
        let ret_addr = self.declare_recursive(&ret_addr_name, Element::number(-1.0))?;

        let mut arg_temps = Vec::with_capacity(params.len());
        for _ in params {
            arg_temps.push(self.temp("arg")?);
        }
        let this_temp = match this {
            Some(_) => Some(self.temp("this")?),
            None => None,
        };

        self.frames.push(Frame {
            method: Some(key.to_string()),
            lookup_floor: depth,
            scope_depth: depth + 1,
            loop_floor,
            recursive: true,
            returns: Vec::new(),
            ret_value: Some(ret.clone()),
        });
        self.regions.push(Region {
            key: key.to_string(),
            body_start: self.list.len(),
            params: param_vars,
            this,
            ret_addr,
            arg_temps,
            this_temp,
            ret_value: ret.clone(),
            call_sites: Vec::new(),
        });

        self.lower_block(body)?;
        self.close_frame()?;

        let region = self
            .regions
            .pop()
            .ok_or_else(|| LowerError::invariant("recursive region closed twice"))?;
        self.list
            .extend(addr.set(region.ret_addr.get(None), None, &[]));
        self.close_scope()?;

        for (id, continuation) in region.call_sites.iter().enumerate() {
            self.list.push(Action::SkipIf {
                condition: Element::compare(
                    addr.get(None),
                    CompareOp::NotEqual,
                    Element::number(id as f64),
                ),
                count: Some(1),
            });
            self.list.push_skip_to(*continuation);
        }
        debug!(
            "recursive region '{}' with {} call sites",
            key,
            region.call_sites.len()
        );

        Ok(ret.get(None))
    }

    /// A call of a recursive method from inside its own region.
    fn recursive_call(
        &mut self,
        region: usize,
        receiver: Option<Element>,
        args: Vec<Element>,
    ) -> Result<Element, LowerError> {
        let (params, this, ret_addr, arg_temps, this_temp, body_start, ret, id) = {
            let region = &self.regions[region];
            (
                region.params.clone(),
                region.this.clone(),
                region.ret_addr.clone(),
                region.arg_temps.clone(),
                region.this_temp.clone(),
                region.body_start,
                region.ret_value.clone(),
                region.call_sites.len(),
            )
        };

        // Arguments read the current frame, so park them before pushing.
        for (temp, arg) in arg_temps.iter().zip(args) {
            self.list.extend(temp.set(arg, None, &[]));
        }
        if let (Some(temp), Some(receiver)) = (&this_temp, receiver) {
            self.list.extend(temp.set(receiver, None, &[]));
        }

        for (param, temp) in params.iter().zip(&arg_temps) {
            self.list.extend(param.push_actions(temp.get(None), None));
        }
        if let (Some(this), Some(temp)) = (&this, &this_temp) {
            self.list.extend(this.push_actions(temp.get(None), None));
        }
        self.list
            .extend(ret_addr.push_actions(Element::number(id as f64), None));
        self.list.push_skip_to(body_start);

        let continuation = self.list.len();
        self.regions[region].call_sites.push(continuation);
        Ok(ret.get(None))
    }
}
