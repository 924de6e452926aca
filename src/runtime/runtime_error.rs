use crate::action::check::CheckError;

/// Why the reference engine stopped a unit before it completed or aborted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime error: no unit named '{0}'")]
    UnknownUnit(String),

    #[error("runtime error: {0}")]
    Malformed(#[from] CheckError),

    #[error("runtime error at {ip:04}: {store} slot {slot} is outside capacity {capacity}")]
    SlotOutOfRange {
        ip: usize,
        store: String,
        slot: u32,
        capacity: u32,
    },

    #[error("runtime error at {ip:04}: cannot write index {index}")]
    BadIndex { ip: usize, index: f64 },

    #[error("runtime error at {ip:04}: array would grow to {len} elements (limit {limit})")]
    ArrayTooLong { ip: usize, len: usize, limit: usize },

    #[error("runtime error at {ip:04}: execution step limit exceeded ({limit})")]
    StepLimit { ip: usize, limit: usize },
}

impl RuntimeError {
    /// Position of the action that failed, if the error has one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            RuntimeError::UnknownUnit(_) => None,
            RuntimeError::Malformed(err) => Some(err.position),
            RuntimeError::SlotOutOfRange { ip, .. }
            | RuntimeError::BadIndex { ip, .. }
            | RuntimeError::ArrayTooLong { ip, .. }
            | RuntimeError::StepLimit { ip, .. } => Some(*ip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_position() {
        let err = RuntimeError::StepLimit { ip: 12, limit: 100 };
        assert_eq!(
            err.to_string(),
            "runtime error at 0012: execution step limit exceeded (100)"
        );
        assert_eq!(err.ip(), Some(12));
    }

    #[test]
    fn test_check_error_converts() {
        let err: RuntimeError = CheckError {
            position: 3,
            message: "skip was never resolved".to_string(),
        }
        .into();
        assert!(matches!(err, RuntimeError::Malformed(_)));
        assert_eq!(err.ip(), Some(3));
    }
}
