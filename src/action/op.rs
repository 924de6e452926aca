use serde::{Deserialize, Serialize};

use super::element::{Element, Store};

// =============================================================================
// ACTION - Target instructions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    // ==========================================================================
    // Storage
    // ==========================================================================
    /// Write a pool slot. With `index`, writes one element of the array held
    /// by the slot (the only indexed write the target has); the array is
    /// zero-extended when `index` is past its end.
    SetVariable {
        store: Store,
        slot: u32,
        index: Option<Element>,
        value: Element,
    },

    // ==========================================================================
    // Relative skips
    // ==========================================================================
    /// Skip `count` following instructions when `condition` is truthy.
    /// `None` while the guarded region is still being emitted.
    SkipIf {
        condition: Element,
        count: Option<i32>,
    },

    /// Skip `count` following instructions. Negative counts skip backward:
    /// the next instruction is `ip + count + 1`.
    Skip { count: Option<i32> },

    /// Stop executing the unit.
    Abort,
}

impl Action {
    pub fn set(store: Store, slot: u32, value: Element) -> Self {
        Action::SetVariable {
            store,
            slot,
            index: None,
            value,
        }
    }

    pub fn set_at(store: Store, slot: u32, index: Element, value: Element) -> Self {
        Action::SetVariable {
            store,
            slot,
            index: Some(index),
            value,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Action::Skip { .. } | Action::SkipIf { .. })
    }

    /// The skip count, if this is a skip.
    pub fn skip_count(&self) -> Option<Option<i32>> {
        match self {
            Action::Skip { count } | Action::SkipIf { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn element_count(&self) -> usize {
        1 + match self {
            Action::SetVariable {
                store,
                index,
                value,
                ..
            } => {
                store.element_count()
                    + index.as_ref().map_or(0, Element::element_count)
                    + value.element_count()
            }
            // the count itself is a number element
            Action::SkipIf { condition, .. } => condition.element_count() + 1,
            Action::Skip { .. } => 1,
            Action::Abort => 0,
        }
    }
}
