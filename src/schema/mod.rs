//! Schema subsystem
//!
//! A schema is a closed set of node kinds, each implementing the same four
//! algorithms: sanitize, validate, to-plain and populate (the latter lives in
//! `crate::populate`).
//!
//! # Design Principles
//!
//! - Sanitize checks shape only and is synchronous
//! - Validate checks constraints, is async, and reports the first violation
//! - Schema nodes are immutable once a model is built
//! - Containers recurse through the same per-field algorithm at any depth

mod errors;
mod plain;
mod sanitize;
mod types;
mod validator;

pub use errors::{
    FieldPath, KindTag, PathSegment, SanitizationError, SanitizeReason, ValidateReason,
    ValidationError, ValidatorError,
};
pub use types::{
    ArraySchema, CollectionAccessor, CustomValidator, DateRules, DefaultValue, Field, FieldKind,
    NumberRules, ObjectSchema, ReferenceSchema, SchemaMap, StringRules, ValidatorFuture,
};

pub(crate) use plain::{plain_fields, Ancestors};
pub(crate) use sanitize::sanitize_fields;
pub(crate) use validator::validate_fields;
