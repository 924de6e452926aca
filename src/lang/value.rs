use serde::{Deserialize, Serialize};

/// Runtime value held by a pool slot on the target engine.
///
/// The target only knows numbers, booleans and (possibly nested) arrays.
/// Reads that miss (unset slot, index past the end, last of an empty array)
/// produce the neutral value, `Number(0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit floating-point number. Handles and indices are numbers too.
    Number(f64),

    /// Boolean value.
    Bool(bool),

    /// Array value: `[ 1 2 3 ]`.
    Array(Vec<Value>),
}

impl Value {
    /// The value every store slot starts with and every miss reads as.
    pub const fn neutral() -> Self {
        Value::Number(0.0)
    }

    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Array(_) => 0.0,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Array(items) => !items.is_empty(),
        }
    }

    /// View the value as an array. Scalars become a one-element array, the
    /// way the target treats a non-array operand of an array operation.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    pub fn items(&self) -> &[Value] {
        match self {
            Value::Array(items) => items,
            _ => &[],
        }
    }

    /// Equality as the target compares: numbers and booleans compare
    /// numerically, arrays element-wise.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Array(_), _) | (_, Value::Array(_)) => false,
            (a, b) => a.as_number() == b.as_number(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::neutral()
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_is_zero() {
        assert_eq!(Value::neutral(), Value::Number(0.0));
        assert!(!Value::neutral().truthy());
    }

    #[test]
    fn test_loose_equality_mixes_bool_and_number() {
        assert!(Value::Bool(true).loosely_equals(&Value::Number(1.0)));
        assert!(!Value::Bool(false).loosely_equals(&Value::Number(1.0)));
        assert!(!Value::Array(vec![]).loosely_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_display_nested_array() {
        let v = Value::Array(vec![
            Value::Number(1.0),
            Value::Array(vec![Value::Bool(true)]),
        ]);
        assert_eq!(v.to_string(), "[1 [true]]");
    }
}
