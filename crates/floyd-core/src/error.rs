use std::fmt;

/// A byte offset into the program source, carried by statements for
/// diagnostics. Synthesized nodes use `Location::none()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location(i64);

impl Location {
    pub fn new(offset: usize) -> Self {
        Location(offset as i64)
    }

    /// The location of a node that has no source position.
    pub fn none() -> Self {
        Location(-1)
    }

    pub fn is_none(&self) -> bool {
        self.0 < 0
    }

    pub fn offset(&self) -> Option<usize> {
        if self.0 < 0 {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset() {
            Some(offset) => write!(f, "@{offset}"),
            None => write!(f, "@?"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FloydError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Division by zero")]
    DivideByZero,

    #[error("Unknown identifier: {0}")]
    Unbound(String),

    #[error("Arity error: {name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Cannot compare values of different types: {left} vs {right}")]
    Incomparable { left: String, right: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Eval error: {0}")]
    Eval(String),
}

impl FloydError {
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        FloydError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        FloydError::Arity {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn incomparable(left: impl Into<String>, right: impl Into<String>) -> Self {
        FloydError::Incomparable {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        FloydError::Decode(msg.into())
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        FloydError::Eval(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_none() {
        assert!(Location::none().is_none());
        assert_eq!(Location::none().offset(), None);
        assert_eq!(Location::new(17).offset(), Some(17));
    }

    #[test]
    fn test_error_messages() {
        let e = FloydError::type_mismatch("int", "string");
        assert_eq!(e.to_string(), "Type mismatch: expected int, got string");
        let e = FloydError::arity("f", 2, 3);
        assert_eq!(e.to_string(), "Arity error: f expects 2 arguments, got 3");
    }
}
