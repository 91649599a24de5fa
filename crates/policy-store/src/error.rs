//! Error types for the policy store
//!
//! Probing operations (`exists`, `is_*`, `value_count`) never produce these;
//! they are reserved for genuine resolution attempts and writes.

use crate::path::PathError;
use crate::value::ValueType;

/// Boxed source error carried by [`PolicyError::LoadError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`Policy`](crate::Policy) accessors and mutators
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The name does not resolve to any value
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// The name resolves, but under a different tag than requested, or a
    /// non-final segment is not a sub-policy
    #[error("type mismatch for '{name}': expected {expected}, found {actual}")]
    TypeError {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// Installing the sub-policy would make a policy its own descendant
    #[error("cannot install sub-policy at '{0}': it would contain itself")]
    CyclicReference(String),

    /// The name is not a well-formed dotted path
    #[error("invalid parameter name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: PathError,
    },

    /// An external policy reference could not be fetched or parsed
    #[error("failed to load policy file '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: BoxError,
    },
}

impl PolicyError {
    /// Create type mismatch error
    #[inline]
    pub fn type_error(name: impl Into<String>, expected: ValueType, actual: ValueType) -> Self {
        Self::TypeError {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// Create load error for path
    #[inline]
    pub fn load_error(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::LoadError {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True for [`PolicyError::NameNotFound`]
    #[inline]
    #[must_use]
    pub fn is_name_not_found(&self) -> bool {
        matches!(self, Self::NameNotFound(_))
    }

    /// True for tag-related failures, including self-referential installs
    #[inline]
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError { .. } | Self::CyclicReference(_))
    }

    /// True for [`PolicyError::LoadError`]
    #[inline]
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::LoadError { .. })
    }
}

/// Result type alias for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_not_found_display() {
        let err = PolicyError::NameNotFound("foo.bar".to_string());
        assert_eq!(err.to_string(), "name not found: foo.bar");
        assert!(err.is_name_not_found());
    }

    #[test]
    fn type_error_display() {
        let err = PolicyError::type_error("doall", ValueType::Int, ValueType::String);
        assert_eq!(
            err.to_string(),
            "type mismatch for 'doall': expected int, found string"
        );
        assert!(err.is_type_error());
    }

    #[test]
    fn cyclic_reference_is_type_class() {
        assert!(PolicyError::CyclicReference("a.b".into()).is_type_error());
    }

    #[test]
    fn load_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = PolicyError::load_error("sub.paf", io);
        assert!(err.is_load_error());
        assert!(err.to_string().contains("sub.paf"));
        assert!(err.source().is_some());
    }
}
