use serde::{Deserialize, Serialize};

use crate::lang::BinaryOp;

/// Count used as "everything after" in array slices. Larger than any array
/// the target can hold.
pub const SLICE_REST: f64 = 9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    /// The operator that holds exactly when `self` does not.
    pub fn inverse(self) -> Self {
        match self {
            CompareOp::Equal => CompareOp::NotEqual,
            CompareOp::NotEqual => CompareOp::Equal,
            CompareOp::Less => CompareOp::GreaterEqual,
            CompareOp::LessEqual => CompareOp::Greater,
            CompareOp::Greater => CompareOp::LessEqual,
            CompareOp::GreaterEqual => CompareOp::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        }
    }
}

/// Which flat store an element or action addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Store {
    Global,
    /// The per-actor store of the actor the element evaluates to.
    Actor(Box<Element>),
}

/// Pure value expression of the target.
///
/// Elements never have effects; everything that writes is an
/// [`Action`](super::op::Action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Number(f64),
    Bool(bool),
    /// Create an array from the element values.
    Array(Vec<Element>),

    /// Read one pool slot.
    Variable { store: Store, slot: u32 },

    ValueInArray {
        array: Box<Element>,
        index: Box<Element>,
    },
    CountOf(Box<Element>),
    LastOf(Box<Element>),
    /// Concatenate when `value` is an array, push otherwise.
    Append {
        array: Box<Element>,
        value: Box<Element>,
    },
    ArraySlice {
        array: Box<Element>,
        start: Box<Element>,
        count: Box<Element>,
    },
    /// Position of `value` in `array`, or -1.
    IndexOfArrayValue {
        array: Box<Element>,
        value: Box<Element>,
    },

    Arithmetic {
        op: ArithOp,
        lhs: Box<Element>,
        rhs: Box<Element>,
    },
    Compare {
        lhs: Box<Element>,
        op: CompareOp,
        rhs: Box<Element>,
    },
    And(Box<Element>, Box<Element>),
    Or(Box<Element>, Box<Element>),
    Not(Box<Element>),

    /// The actor executing the unit.
    EventPlayer,
}

impl Element {
    pub fn number(n: impl Into<f64>) -> Self {
        Element::Number(n.into())
    }

    pub fn neutral() -> Self {
        Element::Number(0.0)
    }

    pub fn value_in_array(self, index: Element) -> Self {
        Element::ValueInArray {
            array: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn count_of(self) -> Self {
        Element::CountOf(Box::new(self))
    }

    pub fn last_of(self) -> Self {
        Element::LastOf(Box::new(self))
    }

    pub fn append(self, value: Element) -> Self {
        Element::Append {
            array: Box::new(self),
            value: Box::new(value),
        }
    }

    pub fn slice(self, start: Element, count: Element) -> Self {
        Element::ArraySlice {
            array: Box::new(self),
            start: Box::new(start),
            count: Box::new(count),
        }
    }

    pub fn index_of(self, value: Element) -> Self {
        Element::IndexOfArrayValue {
            array: Box::new(self),
            value: Box::new(value),
        }
    }

    pub fn arith(op: ArithOp, lhs: Element, rhs: Element) -> Self {
        Element::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: Element) -> Self {
        Element::arith(ArithOp::Add, self, rhs)
    }

    pub fn subtract(self, rhs: Element) -> Self {
        Element::arith(ArithOp::Subtract, self, rhs)
    }

    pub fn compare(lhs: Element, op: CompareOp, rhs: Element) -> Self {
        Element::Compare {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    /// Logical negation, folding the cases that have a direct inverse.
    pub fn negate(self) -> Self {
        match self {
            Element::Compare { lhs, op, rhs } => Element::Compare {
                lhs,
                op: op.inverse(),
                rhs,
            },
            Element::Not(inner) => *inner,
            Element::Bool(b) => Element::Bool(!b),
            other => Element::Not(Box::new(other)),
        }
    }

    /// Map a source operator onto the target's element.
    pub fn binary(op: BinaryOp, lhs: Element, rhs: Element) -> Self {
        match op {
            BinaryOp::Add => Element::arith(ArithOp::Add, lhs, rhs),
            BinaryOp::Sub => Element::arith(ArithOp::Subtract, lhs, rhs),
            BinaryOp::Mul => Element::arith(ArithOp::Multiply, lhs, rhs),
            BinaryOp::Div => Element::arith(ArithOp::Divide, lhs, rhs),
            BinaryOp::Mod => Element::arith(ArithOp::Modulo, lhs, rhs),
            BinaryOp::Eq => Element::compare(lhs, CompareOp::Equal, rhs),
            BinaryOp::Ne => Element::compare(lhs, CompareOp::NotEqual, rhs),
            BinaryOp::Lt => Element::compare(lhs, CompareOp::Less, rhs),
            BinaryOp::Le => Element::compare(lhs, CompareOp::LessEqual, rhs),
            BinaryOp::Gt => Element::compare(lhs, CompareOp::Greater, rhs),
            BinaryOp::Ge => Element::compare(lhs, CompareOp::GreaterEqual, rhs),
            BinaryOp::And => Element::And(Box::new(lhs), Box::new(rhs)),
            BinaryOp::Or => Element::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// `array` with `value` written at `index`, built from slices:
    /// `array[..index] ++ [value] ++ array[index + 1..]`.
    pub fn splice(array: Element, index: Element, value: Element) -> Self {
        let before = array.clone().slice(Element::number(0.0), index.clone());
        let after = array.slice(index.add(Element::number(1.0)), Element::number(SLICE_REST));
        before.append(Element::Array(vec![value])).append(after)
    }

    /// Number of element nodes, the unit the target's capacity is measured in.
    pub fn element_count(&self) -> usize {
        1 + match self {
            Element::Number(_) | Element::Bool(_) | Element::EventPlayer => 0,
            Element::Array(items) => items.iter().map(Element::element_count).sum(),
            Element::Variable { store, .. } => store.element_count(),
            Element::CountOf(inner) | Element::LastOf(inner) | Element::Not(inner) => {
                inner.element_count()
            }
            Element::ValueInArray { array, index } => array.element_count() + index.element_count(),
            Element::Append { array, value } | Element::IndexOfArrayValue { array, value } => {
                array.element_count() + value.element_count()
            }
            Element::ArraySlice {
                array,
                start,
                count,
            } => array.element_count() + start.element_count() + count.element_count(),
            Element::Arithmetic { lhs, rhs, .. } | Element::Compare { lhs, rhs, .. } => {
                lhs.element_count() + rhs.element_count()
            }
            Element::And(lhs, rhs) | Element::Or(lhs, rhs) => {
                lhs.element_count() + rhs.element_count()
            }
        }
    }
}

impl Store {
    pub fn element_count(&self) -> usize {
        match self {
            Store::Global => 0,
            Store::Actor(actor) => actor.element_count(),
        }
    }
}

impl From<f64> for Element {
    fn from(n: f64) -> Self {
        Element::Number(n)
    }
}
