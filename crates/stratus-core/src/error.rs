//! Error types and result aliases shared across Stratus components.
//!
//! The taxonomy distinguishes failures scoped to a single upstream entity
//! (a volume or stage being processed) from infrastructure failures, so
//! callers can skip-and-record the former while treating the latter as
//! fatal for the operation at hand.

use std::fmt;

/// The result type used throughout Stratus.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Stratus operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A registry or gateway call failed or timed out.
    ///
    /// Scoped to the named entity; the enclosing run may continue with
    /// the remaining entities.
    #[error("upstream failure for {entity}: {message}")]
    Upstream {
        /// The volume or stage the call was issued for, or a scope label
        /// (e.g. `account`) for enumeration calls.
        entity: String,
        /// Description of the upstream failure.
        message: String,
    },

    /// A descriptor property could not be parsed as structured data, or a
    /// required field was absent.
    #[error("malformed descriptor for {entity}: {message}")]
    MalformedDescriptor {
        /// The volume whose descriptor was being parsed.
        entity: String,
        /// Description of what could not be parsed.
        message: String,
    },

    /// A catalog store operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A precondition for the operation was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates an upstream failure scoped to the given entity.
    #[must_use]
    pub fn upstream(entity: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Upstream {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Creates a malformed-descriptor failure scoped to the given entity.
    #[must_use]
    pub fn malformed(entity: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true if this error is scoped to a single upstream entity
    /// and the enclosing run can continue without it.
    #[must_use]
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::MalformedDescriptor { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_scoped_classification() {
        assert!(Error::upstream("VOL_A", "timed out").is_entity_scoped());
        assert!(Error::malformed("VOL_B", "not json").is_entity_scoped());
        assert!(!Error::storage("put failed").is_entity_scoped());
        assert!(!Error::NotFound("x".into()).is_entity_scoped());
    }

    #[test]
    fn display_includes_entity() {
        let err = Error::upstream("ICEBERG_VOL", "connection reset");
        assert_eq!(
            err.to_string(),
            "upstream failure for ICEBERG_VOL: connection reset"
        );
    }
}
