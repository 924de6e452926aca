use crate::lang::{PoolKind, Span};

/// Why lowering of a unit failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LowerError {
    /// A pool or the class handle table ran out of slots.
    #[error("{pool} pool exhausted: cannot allocate '{owner}' (capacity {capacity})")]
    ResourceExhausted {
        pool: PoolKind,
        capacity: u32,
        owner: String,
        span: Option<Span>,
    },

    /// The lowering broke one of its own rules (skip patched twice, builder
    /// steps out of order, unbalanced stack scope, unresolved symbol in a
    /// tree that should have been resolved). Always a compiler defect.
    #[error("internal error: {message}")]
    InvariantViolation { message: String, span: Option<Span> },

    /// A construct this lowering cannot express on the target.
    #[error("{construct} is not supported: {reason}")]
    UnsupportedConstruct {
        construct: String,
        reason: String,
        span: Option<Span>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceExhausted,
    InvariantViolation,
    UnsupportedConstruct,
}

impl LowerError {
    pub fn exhausted(pool: PoolKind, capacity: u32, owner: impl Into<String>) -> Self {
        LowerError::ResourceExhausted {
            pool,
            capacity,
            owner: owner.into(),
            span: None,
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        LowerError::InvariantViolation {
            message: message.into(),
            span: None,
        }
    }

    pub fn unsupported(construct: impl Into<String>, reason: impl Into<String>) -> Self {
        LowerError::UnsupportedConstruct {
            construct: construct.into(),
            reason: reason.into(),
            span: None,
        }
    }

    /// Attach a location unless a more precise one is already set.
    pub fn with_span(mut self, at: Span) -> Self {
        let span = match &mut self {
            LowerError::ResourceExhausted { span, .. }
            | LowerError::InvariantViolation { span, .. }
            | LowerError::UnsupportedConstruct { span, .. } => span,
        };
        if span.is_none() {
            *span = Some(at);
        }
        self
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            LowerError::ResourceExhausted { span, .. }
            | LowerError::InvariantViolation { span, .. }
            | LowerError::UnsupportedConstruct { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LowerError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            LowerError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            LowerError::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A located message for the diagnostics layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub unit: String,
    pub severity: Severity,
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn from_error(unit: &str, error: &LowerError) -> Self {
        Self {
            unit: unit.to_string(),
            severity: Severity::Error,
            kind: Some(error.kind()),
            message: error.to_string(),
            span: error.span(),
        }
    }

    pub fn warning(unit: &str, message: impl Into<String>) -> Self {
        Self {
            unit: unit.to_string(),
            severity: Severity::Warning,
            kind: None,
            message: message.into(),
            span: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: [{}] ", level, self.unit)?;
        if let Some(span) = self.span {
            write!(f, "{}: ", span)?;
        }
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_span_keeps_inner_location() {
        let err = LowerError::invariant("x")
            .with_span(Span::new(3, 4))
            .with_span(Span::new(1, 1));
        assert_eq!(err.span(), Some(Span::new(3, 4)));
    }

    #[test]
    fn test_diagnostic_display() {
        let err = LowerError::exhausted(PoolKind::Global, 2, "counter").with_span(Span::new(7, 2));
        let diag = Diagnostic::from_error("main", &err);
        assert_eq!(
            diag.to_string(),
            "error: [main] 7:2: global pool exhausted: cannot allocate 'counter' (capacity 2)"
        );
        assert_eq!(diag.kind, Some(ErrorKind::ResourceExhausted));
    }
}
