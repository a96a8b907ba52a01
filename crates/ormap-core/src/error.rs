//! Error taxonomy shared by every ormap crate.
//!
//! Only [`Error::NotFound`] is an expected condition: mappers branch on it
//! locally (fallback query, empty relation, dead model). Every other variant
//! is a contract violation or a store failure and propagates to the caller.

/// Errors raised by models, mappers and row stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No cached or stored match.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller broke an argument contract (empty key, non-positive id,
    /// memory-only dummy passed to a persistence path, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the current state of the receiver.
    #[error("bad method call: {0}")]
    BadMethodCall(String),

    /// A mapper declares a relation the schema cannot back.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// A typed accessor found a field of a different shape.
    #[error("unexpected value for field \"{field}\": expected {expected}")]
    UnexpectedValue {
        field: String,
        expected: &'static str,
    },

    /// Failure reported by a row store implementation.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn bad_method_call(message: impl Into<String>) -> Self {
        Self::BadMethodCall(message.into())
    }

    pub fn misconfiguration(message: impl Into<String>) -> Self {
        Self::Misconfiguration(message.into())
    }

    /// Whether this is the recoverable "no match" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias used across ormap.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_recoverable() {
        assert!(Error::not_found("uid 4").is_not_found());
        assert!(!Error::invalid_argument("uid 0").is_not_found());
        assert!(!Error::Store("disk full".to_string()).is_not_found());
    }

    #[test]
    fn test_display_includes_field_name() {
        let err = Error::UnexpectedValue {
            field: "owner".to_string(),
            expected: "model",
        };
        assert_eq!(
            err.to_string(),
            "unexpected value for field \"owner\": expected model"
        );
    }
}
