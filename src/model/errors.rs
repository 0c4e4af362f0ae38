//! # Model Errors

use thiserror::Error;

use crate::collection::CollectionError;
use crate::schema::{SanitizationError, ValidationError};

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Failures surfaced by instance operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error(transparent)]
    Sanitization(#[from] SanitizationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced identifier is missing from its collection
    #[error("Id `{0}` not found")]
    IdNotFound(String),

    /// A population spec names a field the schema does not declare
    #[error("Key `{0}` not found in schema.")]
    KeyNotInSchema(String),

    #[error("cannot populate type {0}")]
    CannotPopulate(&'static str),

    #[error("Invalid populate spec: {0}")]
    InvalidPopulateSpec(String),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

impl ModelError {
    /// Machine-readable code, matching the structured reason codes where one exists
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::Sanitization(err) => err.code(),
            ModelError::Validation(err) => err.code(),
            ModelError::IdNotFound(_) => "id-not-found",
            ModelError::KeyNotInSchema(_) => "key-not-in-schema",
            ModelError::CannotPopulate(_) => "cannot-populate",
            ModelError::InvalidPopulateSpec(_) => "invalid-populate-spec",
            ModelError::Collection(_) => "collection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldPath;

    #[test]
    fn test_lookup_messages() {
        assert_eq!(
            ModelError::IdNotFound("missing".into()).to_string(),
            "Id `missing` not found"
        );
        assert_eq!(
            ModelError::KeyNotInSchema("nope".into()).to_string(),
            "Key `nope` not found in schema."
        );
        assert_eq!(
            ModelError::CannotPopulate("string").to_string(),
            "cannot populate type string"
        );
    }

    #[test]
    fn test_structured_errors_pass_through() {
        let err: ModelError = ValidationError::required(&FieldPath::root().child("name")).into();
        assert_eq!(err.code(), "required");
        assert_eq!(err.to_string(), "[required] name: value is required");
    }
}
