use crate::action::{Action, Element, Store};
use crate::lang::PoolKind;

use super::error::LowerError;
use super::memory::Slot;

// =============================================================================
// INDEXED VARIABLE
// =============================================================================

/// A slot plus an optional index path into the array it holds.
///
/// The target can only index one level deep on write; deeper writes are
/// rebuilt from slices (see [`IndexedVar::set`]).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVar {
    name: String,
    pool: PoolKind,
    slot: Slot,
    path: Vec<Element>,
}

impl IndexedVar {
    pub fn new(name: impl Into<String>, pool: PoolKind, slot: Slot) -> Self {
        Self {
            name: name.into(),
            pool,
            slot,
            path: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> PoolKind {
        self.pool
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn path(&self) -> &[Element] {
        &self.path
    }

    /// The same slot, one array level further in.
    pub fn child(&self, index: Element) -> Self {
        let mut child = self.clone();
        child.path.push(index);
        child
    }

    fn store(&self, actor: Option<&Element>) -> Store {
        match self.pool {
            PoolKind::Global => Store::Global,
            PoolKind::Actor => Store::Actor(Box::new(
                actor.cloned().unwrap_or(Element::EventPlayer),
            )),
        }
    }

    fn root(&self, actor: Option<&Element>) -> Element {
        Element::Variable {
            store: self.store(actor),
            slot: self.slot,
        }
    }

    /// Read the value at the variable's path. `actor` picks whose store a
    /// per-actor variable reads; the executing actor when `None`.
    pub fn get(&self, actor: Option<&Element>) -> Element {
        self.path
            .iter()
            .fold(self.root(actor), |array, index| array.value_in_array(index.clone()))
    }

    /// Write `value` at `path ++ extra`.
    ///
    /// Up to one index is a single native write. Deeper paths read every
    /// level, rebuild the innermost array around the new value, splice each
    /// rebuilt level into its parent and write the outermost level natively.
    /// Every intermediate array must already hold the indexed position.
    pub fn set(&self, value: Element, actor: Option<&Element>, extra: &[Element]) -> Vec<Action> {
        let path: Vec<Element> = self.path.iter().chain(extra).cloned().collect();
        let store = self.store(actor);

        match path.as_slice() {
            [] => vec![Action::set(store, self.slot, value)],
            [index] => vec![Action::set_at(store, self.slot, index.clone(), value)],
            [first, rest @ ..] => {
                // levels[k] is the array the (k + 1)-th index points into
                let mut levels = Vec::with_capacity(rest.len());
                let mut array = self.root(actor).value_in_array(first.clone());
                for index in &rest[..rest.len() - 1] {
                    levels.push(array.clone());
                    array = array.value_in_array(index.clone());
                }
                levels.push(array);

                let rebuilt = levels
                    .into_iter()
                    .zip(rest.iter())
                    .rev()
                    .fold(value, |inner, (array, index)| {
                        Element::splice(array, index.clone(), inner)
                    });

                vec![Action::set_at(store, self.slot, first.clone(), rebuilt)]
            }
        }
    }
}

// =============================================================================
// RECURSIVE VARIABLE
// =============================================================================

/// One slot holding a stack, so a name can have one live value per
/// activation of the scope that declares it.
///
/// The top of the stack is the current value. `enter` pushes and `exit`
/// pops; the open count tracks their balance while lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveVar {
    stack: IndexedVar,
    open: u32,
}

impl RecursiveVar {
    pub fn new(name: impl Into<String>, pool: PoolKind, slot: Slot) -> Self {
        Self {
            stack: IndexedVar::new(name, pool, slot),
            open: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.stack.name()
    }

    pub fn slot(&self) -> Slot {
        self.stack.slot()
    }

    pub fn stack(&self) -> &IndexedVar {
        &self.stack
    }

    /// Pushes emitted through `enter` that have not been popped yet.
    pub fn open_count(&self) -> u32 {
        self.open
    }

    fn depth(&self, actor: Option<&Element>) -> Element {
        self.stack.get(actor).count_of()
    }

    fn top(&self, actor: Option<&Element>) -> Element {
        self.depth(actor).subtract(Element::number(1.0))
    }

    pub fn get(&self, actor: Option<&Element>) -> Element {
        self.stack.get(actor).last_of()
    }

    /// Overwrite the top of the stack (or a position inside it).
    pub fn set(&self, value: Element, actor: Option<&Element>, extra: &[Element]) -> Vec<Action> {
        let mut path = vec![self.top(actor)];
        path.extend_from_slice(extra);
        self.stack.set(value, actor, &path)
    }

    pub fn push_actions(&self, initial: Element, actor: Option<&Element>) -> Vec<Action> {
        self.stack.set(initial, actor, &[self.depth(actor)])
    }

    pub fn pop_actions(&self, actor: Option<&Element>) -> Vec<Action> {
        let remaining = self
            .stack
            .get(actor)
            .slice(Element::number(0.0), self.top(actor));
        self.stack.set(remaining, actor, &[])
    }

    pub fn enter(&mut self, initial: Element, actor: Option<&Element>) -> Vec<Action> {
        self.open += 1;
        self.push_actions(initial, actor)
    }

    pub fn exit(&mut self, actor: Option<&Element>) -> Result<Vec<Action>, LowerError> {
        if self.open == 0 {
            return Err(LowerError::invariant(format!(
                "recursive variable '{}' popped without a matching push",
                self.name()
            )));
        }
        self.open -= 1;
        Ok(self.pop_actions(actor))
    }
}

// =============================================================================
// VARIABLE
// =============================================================================

/// What a name in scope is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Indexed(IndexedVar),
    Recursive(RecursiveVar),
    /// A read-only element: foreach elements, `this` outside recursion.
    Reference(Element),
}

impl Variable {
    pub fn get(&self) -> Element {
        self.get_for(None)
    }

    pub fn set(&self, name: &str, value: Element, extra: &[Element]) -> Result<Vec<Action>, LowerError> {
        self.set_for(name, value, None, extra)
    }

    /// Pool the name's storage lives in; `None` for references.
    pub fn pool(&self) -> Option<PoolKind> {
        match self {
            Variable::Indexed(var) => Some(var.pool()),
            Variable::Recursive(var) => Some(var.stack().pool()),
            Variable::Reference(_) => None,
        }
    }

    /// Read as seen by `actor`. Only per-actor storage differs per actor.
    pub fn get_for(&self, actor: Option<&Element>) -> Element {
        match self {
            Variable::Indexed(var) => var.get(actor),
            Variable::Recursive(var) => var.get(actor),
            Variable::Reference(element) => element.clone(),
        }
    }

    pub fn set_for(
        &self,
        name: &str,
        value: Element,
        actor: Option<&Element>,
        extra: &[Element],
    ) -> Result<Vec<Action>, LowerError> {
        match self {
            Variable::Indexed(var) => Ok(var.set(value, actor, extra)),
            Variable::Recursive(var) => Ok(var.set(value, actor, extra)),
            Variable::Reference(_) => Err(LowerError::unsupported(
                format!("assignment to '{}'", name),
                "the name is bound to a read-only value",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SLICE_REST;

    fn global(slot: Slot) -> Element {
        Element::Variable {
            store: Store::Global,
            slot,
        }
    }

    #[test]
    fn test_get_wraps_path() {
        let var = IndexedVar::new("grid", PoolKind::Global, 2)
            .child(Element::number(1.0))
            .child(Element::number(4.0));
        assert_eq!(
            var.get(None),
            global(2)
                .value_in_array(Element::number(1.0))
                .value_in_array(Element::number(4.0))
        );
    }

    #[test]
    fn test_actor_pool_defaults_to_event_player() {
        let var = IndexedVar::new("hp", PoolKind::Actor, 0);
        match var.get(None) {
            Element::Variable {
                store: Store::Actor(actor),
                slot: 0,
            } => assert_eq!(*actor, Element::EventPlayer),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_explicit_actor_picks_store() {
        let other = Element::number(2.0);
        let var = IndexedVar::new("hp", PoolKind::Actor, 3);
        let store = Store::Actor(Box::new(other.clone()));
        assert_eq!(
            var.get(Some(&other)),
            Element::Variable {
                store: store.clone(),
                slot: 3
            }
        );
        assert_eq!(
            var.set(Element::number(9.0), Some(&other), &[]),
            vec![Action::set(store, 3, Element::number(9.0))]
        );
    }

    #[test]
    fn test_recursive_top_uses_explicit_actor() {
        let other = Element::number(2.0);
        let var = Variable::Recursive(RecursiveVar::new("depth", PoolKind::Actor, 1));
        let stack = Element::Variable {
            store: Store::Actor(Box::new(other.clone())),
            slot: 1,
        };
        assert_eq!(var.pool(), Some(PoolKind::Actor));
        assert_eq!(var.get_for(Some(&other)), stack.clone().last_of());
        let write = var
            .set_for("depth", Element::number(4.0), Some(&other), &[])
            .unwrap();
        assert_eq!(
            write,
            vec![Action::set_at(
                Store::Actor(Box::new(other)),
                1,
                stack.count_of().subtract(Element::number(1.0)),
                Element::number(4.0)
            )]
        );
    }

    #[test]
    fn test_shallow_writes_are_native() {
        let var = IndexedVar::new("x", PoolKind::Global, 0);
        assert_eq!(
            var.set(Element::number(5.0), None, &[]),
            vec![Action::set(Store::Global, 0, Element::number(5.0))]
        );
        assert_eq!(
            var.set(Element::number(5.0), None, &[Element::number(3.0)]),
            vec![Action::set_at(Store::Global, 0, Element::number(3.0), Element::number(5.0))]
        );
    }

    #[test]
    fn test_two_level_write_splices_inner_array() {
        let var = IndexedVar::new("m", PoolKind::Global, 1);
        let i = Element::number(2.0);
        let j = Element::number(3.0);
        let actions = var.set(Element::number(9.0), None, &[i.clone(), j.clone()]);

        let inner = global(1).value_in_array(i.clone());
        let expected = inner
            .clone()
            .slice(Element::number(0.0), j.clone())
            .append(Element::Array(vec![Element::number(9.0)]))
            .append(inner.slice(j.add(Element::number(1.0)), Element::number(SLICE_REST)));
        assert_eq!(actions, vec![Action::set_at(Store::Global, 1, i, expected)]);
    }

    #[test]
    fn test_recursive_enter_exit_balance() {
        let mut var = RecursiveVar::new("n", PoolKind::Global, 0);
        assert!(var.exit(None).is_err());

        let push = var.enter(Element::number(1.0), None);
        assert_eq!(
            push,
            vec![Action::set_at(
                Store::Global,
                0,
                global(0).count_of(),
                Element::number(1.0)
            )]
        );
        assert_eq!(var.open_count(), 1);
        assert!(var.exit(None).is_ok());
        assert_eq!(var.open_count(), 0);
    }

    #[test]
    fn test_recursive_reads_top() {
        let var = RecursiveVar::new("n", PoolKind::Global, 4);
        assert_eq!(var.get(None), global(4).last_of());
    }

    #[test]
    fn test_reference_is_read_only() {
        let var = Variable::Reference(Element::number(3.0));
        assert_eq!(var.get(), Element::number(3.0));
        assert!(var.set("item", Element::number(1.0), &[]).is_err());
    }
}
