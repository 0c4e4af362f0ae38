//! # Collection Errors

use thiserror::Error;

use crate::schema::{SanitizationError, ValidationError};

/// Result type for collection operations
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Collection errors
#[derive(Debug, Clone, Error)]
pub enum CollectionError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The instance has no usable value in the identity field
    #[error("missing identity field: {0}")]
    MissingIdentity(String),

    #[error("model mismatch: expected {expected}, got {actual}")]
    ModelMismatch { expected: String, actual: String },

    /// The instance failed validation before it was stored
    #[error("invalid document: {0}")]
    Invalid(#[from] ValidationError),

    /// A stored document no longer fits the model schema
    #[error("stored document rejected: {0}")]
    Hydrate(SanitizationError),

    #[error("store error: {0}")]
    Store(String),
}

impl CollectionError {
    /// Whether the failure comes from the backing store rather than the data
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CollectionError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CollectionError::DuplicateKey("42".into()).to_string(),
            "duplicate key: 42"
        );
        assert_eq!(
            CollectionError::DocumentNotFound("7".into()).to_string(),
            "document not found: 7"
        );
    }

    #[test]
    fn test_store_failure() {
        assert!(CollectionError::Store("disk".into()).is_store_failure());
        assert!(!CollectionError::DuplicateKey("1".into()).is_store_failure());
    }
}
