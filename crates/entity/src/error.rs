//! Error types for the entity model.
//!
//! Model errors are local validation failures: they are surfaced to the caller
//! of [`Entity::set`](crate::Entity::set) and friends and are never retried.

use std::fmt;

use thiserror::Error;

/// Errors raised while reading or writing entity fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// A write targeted an immutable declared field with a different value.
    #[error("field `{field}` is immutable and already holds a different value")]
    ImmutableFieldConflict { field: String },

    /// A value could not be converted into the declared type of a field.
    #[error("field `{field}` expects {expected} but got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },
}

impl DataError {
    /// Returns the wire name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            DataError::ImmutableFieldConflict { field } => field,
            DataError::TypeMismatch { field, .. } => field,
        }
    }
}

/// A conversion failure between a [`Value`](crate::Value) and a typed field.
///
/// Conversions do not know which field they are filling; the entity attaches
/// the wire name when turning this into a [`DataError`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub expected: &'static str,
    pub found: String,
}

impl ValueError {
    pub fn new(expected: &'static str, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }

    /// Attaches the wire name of the field being written.
    pub fn for_field(self, field: &str) -> DataError {
        DataError::TypeMismatch {
            field: field.to_string(),
            expected: self.expected,
            found: self.found,
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} but got {}", self.expected, self.found)
    }
}

impl std::error::Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_error_for_field() {
        let err = ValueError::new("integer", "string \"abc\"").for_field("width");
        assert_eq!(err.field(), "width");
        assert_eq!(
            err.to_string(),
            "field `width` expects integer but got string \"abc\""
        );
    }
}
