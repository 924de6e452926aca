use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};

use super::element::Element;
use super::op::Action;
use crate::lower::error::LowerError;

/// Position of a skip instruction inside an [`ActionList`].
///
/// An index rather than a reference so it stays valid while the list keeps
/// growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkipRef(usize);

impl SkipRef {
    pub fn position(self) -> usize {
        self.0
    }
}

/// The flat instruction stream of one compiled unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn push(&mut self, action: Action) -> usize {
        self.actions.push(action);
        self.actions.len() - 1
    }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.actions.extend(actions);
    }

    /// Emit a skip whose count is not known yet. `None` emits an
    /// unconditional skip.
    pub fn push_skip(&mut self, condition: Option<Element>) -> SkipRef {
        let action = match condition {
            Some(condition) => Action::SkipIf {
                condition,
                count: None,
            },
            None => Action::Skip { count: None },
        };
        SkipRef(self.push(action))
    }

    /// Emit an unconditional skip that lands on `target`, which must already
    /// be known (a backward skip, or a forward one over emitted code).
    pub fn push_skip_to(&mut self, target: usize) -> usize {
        let from = self.actions.len();
        self.push(Action::Skip {
            count: Some(Self::skip_distance(from, target)),
        })
    }

    /// Count that makes a skip at `from` land on `target`.
    pub fn skip_distance(from: usize, target: usize) -> i32 {
        target as i32 - from as i32 - 1
    }

    /// Patch a pending skip. A skip is patched exactly once.
    pub fn resolve(&mut self, skip: SkipRef, count: i32) -> Result<(), LowerError> {
        let slot = match self.actions.get_mut(skip.0) {
            Some(Action::Skip { count }) | Some(Action::SkipIf { count, .. }) => count,
            Some(other) => {
                return Err(LowerError::invariant(format!(
                    "action {} is not a skip: {:?}",
                    skip.0, other
                )));
            }
            None => {
                return Err(LowerError::invariant(format!(
                    "skip {} is past the end of the list",
                    skip.0
                )));
            }
        };

        if let Some(existing) = slot {
            return Err(LowerError::invariant(format!(
                "skip {} already resolved to {}",
                skip.0, existing
            )));
        }

        trace!("resolve skip at {} -> {}", skip.0, count);
        *slot = Some(count);
        Ok(())
    }

    /// Patch a pending skip so it lands on the current end of the list.
    pub fn resolve_here(&mut self, skip: SkipRef) -> Result<(), LowerError> {
        let count = Self::skip_distance(skip.0, self.actions.len());
        self.resolve(skip, count)
    }

    /// Position of the first skip still waiting for its count.
    pub fn unresolved(&self) -> Option<usize> {
        self.actions
            .iter()
            .position(|action| matches!(action.skip_count(), Some(None)))
    }

    pub fn element_count(&self) -> usize {
        self.actions.iter().map(Action::element_count).sum()
    }
}

impl<'a> IntoIterator for &'a ActionList {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Output of one compile pass: one action list per unit, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub units: IndexMap<String, ActionList>,
}

impl CompiledProgram {
    pub fn new() -> Self {
        Self {
            units: IndexMap::new(),
        }
    }

    pub fn unit(&self, name: &str) -> Option<&ActionList> {
        self.units.get(name)
    }

    pub fn element_count(&self) -> usize {
        self.units.values().map(ActionList::element_count).sum()
    }

    /// Binary form written by the CLI.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_patches_once() {
        let mut list = ActionList::new();
        let skip = list.push_skip(Some(Element::Bool(true)));
        list.push(Action::Abort);
        list.resolve_here(skip).unwrap();

        assert_eq!(list.actions()[0].skip_count(), Some(Some(1)));
        assert!(list.resolve(skip, 3).is_err());
    }

    #[test]
    fn test_resolve_rejects_non_skip() {
        let mut list = ActionList::new();
        list.push(Action::Abort);
        let bogus = list.push_skip(None);
        list.resolve(bogus, 0).unwrap();
        assert!(list.resolve(SkipRef(0), 0).is_err());
        assert!(list.resolve(SkipRef(9), 0).is_err());
    }

    #[test]
    fn test_unresolved_finds_pending_skip() {
        let mut list = ActionList::new();
        list.push(Action::Abort);
        let skip = list.push_skip(None);
        assert_eq!(list.unresolved(), Some(1));
        list.resolve_here(skip).unwrap();
        assert_eq!(list.unresolved(), None);
    }

    #[test]
    fn test_backward_skip_distance() {
        let mut list = ActionList::new();
        list.push(Action::Abort);
        list.push(Action::Abort);
        let at = list.push_skip_to(0);
        // ip 2 + (-3) + 1 = 0
        assert_eq!(list.actions()[at].skip_count(), Some(Some(-3)));
    }

    #[test]
    fn test_program_postcard_round_trip() {
        let mut list = ActionList::new();
        list.push(Action::Abort);
        let mut program = CompiledProgram::new();
        program.units.insert("main".to_string(), list);

        let bytes = program.to_bytes().unwrap();
        assert_eq!(CompiledProgram::from_bytes(&bytes).unwrap(), program);
    }
}
