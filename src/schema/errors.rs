//! Structured sanitization and validation errors
//!
//! Reason codes:
//! - `no-<kind>` (wrong primitive or container shape)
//! - `key-not-in-schema` (strict mode rejection)
//! - `model-mismatch` (instance of another model type)
//! - `required`, bound violations (`string-min`, `number-max`, ...) and `custom`
//!
//! Both error kinds carry the same context: a message, the reason code, the
//! offending value in plain form, the path from the sanitize/validate root and
//! the instance that owns the field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Instance;

/// Closed set of schema kinds, used in reason codes and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Any,
    Boolean,
    Number,
    String,
    Date,
    Array,
    Object,
    Model,
    Reference,
}

impl KindTag {
    /// Returns the kind name for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::Any => "any",
            KindTag::Boolean => "boolean",
            KindTag::Number => "number",
            KindTag::String => "string",
            KindTag::Date => "date",
            KindTag::Array => "array",
            KindTag::Object => "object",
            KindTag::Model => "model",
            KindTag::Reference => "reference",
        }
    }

    /// Returns the `no-<kind>` reason code
    pub fn mismatch_code(&self) -> &'static str {
        match self {
            KindTag::Any => "no-any",
            KindTag::Boolean => "no-boolean",
            KindTag::Number => "no-number",
            KindTag::String => "no-string",
            KindTag::Date => "no-date",
            KindTag::Array => "no-array",
            KindTag::Object => "no-object",
            KindTag::Model => "no-model",
            KindTag::Reference => "no-reference",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Ordered sequence of field names and array indices from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns this path extended by a field name
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.into()));
        Self(segments)
    }

    /// Returns this path extended by an array index
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the last field segment, if any
    pub fn last_field(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|seg| match seg {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$root");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| PathSegment::Field(s.into())).collect())
    }
}

/// Reasons a raw input is rejected during sanitization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeReason {
    /// Value shape does not match the declared kind
    WrongType(KindTag),
    /// Raw key missing from a strict schema
    KeyNotInSchema,
    /// Instance of a different model type
    ModelMismatch,
}

impl SanitizeReason {
    /// Returns the machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            SanitizeReason::WrongType(kind) => kind.mismatch_code(),
            SanitizeReason::KeyNotInSchema => "key-not-in-schema",
            SanitizeReason::ModelMismatch => "model-mismatch",
        }
    }
}

impl fmt::Display for SanitizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Reasons a sanitized value fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateReason {
    Required,
    WrongType(KindTag),
    StringEnum,
    StringMin,
    StringMax,
    StringRegex,
    NumberMin,
    NumberMax,
    NumberInteger,
    DateMin,
    DateMax,
    ArrayMinLength,
    ArrayMaxLength,
    /// Raised by a custom validator
    Custom,
}

impl ValidateReason {
    /// Returns the machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            ValidateReason::Required => "required",
            ValidateReason::WrongType(kind) => kind.mismatch_code(),
            ValidateReason::StringEnum => "string-enum",
            ValidateReason::StringMin => "string-min",
            ValidateReason::StringMax => "string-max",
            ValidateReason::StringRegex => "string-regex",
            ValidateReason::NumberMin => "number-min",
            ValidateReason::NumberMax => "number-max",
            ValidateReason::NumberInteger => "number-integer",
            ValidateReason::DateMin => "date-min",
            ValidateReason::DateMax => "date-max",
            ValidateReason::ArrayMinLength => "array-min-length",
            ValidateReason::ArrayMaxLength => "array-max-length",
            ValidateReason::Custom => "custom",
        }
    }
}

impl fmt::Display for ValidateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Raw input is fundamentally incompatible with the declared schema.
#[derive(Debug, Clone)]
pub struct SanitizationError {
    reason: SanitizeReason,
    message: String,
    value: Option<serde_json::Value>,
    path: FieldPath,
    instance: Option<Instance>,
}

impl SanitizationError {
    /// Create an error with a reason and message and no context
    pub fn new(reason: SanitizeReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            value: None,
            path: FieldPath::root(),
            instance: None,
        }
    }

    /// Create a wrong shape error
    pub fn wrong_type(expected: KindTag, actual: &str, path: &FieldPath) -> Self {
        Self::new(
            SanitizeReason::WrongType(expected),
            format!("expected {}, got {}", expected, actual),
        )
        .at(path.clone())
    }

    /// Create a strict mode rejection naming the disallowed key
    pub fn key_not_in_schema(key: &str, path: &FieldPath) -> Self {
        Self::new(
            SanitizeReason::KeyNotInSchema,
            format!("key '{}' is not allowed by the schema", key),
        )
        .at(path.child(key))
    }

    /// Create a model type mismatch error
    pub fn model_mismatch(expected: &str, actual: &str, path: &FieldPath) -> Self {
        Self::new(
            SanitizeReason::ModelMismatch,
            format!("expected instance of {}, got instance of {}", expected, actual),
        )
        .at(path.clone())
    }

    pub fn at(mut self, path: FieldPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_instance(mut self, instance: Option<&Instance>) -> Self {
        self.instance = instance.cloned();
        self
    }

    pub fn reason(&self) -> SanitizeReason {
        self.reason
    }

    /// Returns the reason code string
    pub fn code(&self) -> &'static str {
        self.reason.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }
}

impl fmt::Display for SanitizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.reason.code(), self.path, self.message)
    }
}

impl std::error::Error for SanitizationError {}

/// A sanitized value violates a semantic constraint.
#[derive(Debug, Clone)]
pub struct ValidationError {
    reason: ValidateReason,
    message: String,
    value: Option<serde_json::Value>,
    path: FieldPath,
    instance: Option<Instance>,
}

impl ValidationError {
    /// Create an error with a reason and message and no context
    pub fn new(reason: ValidateReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            value: None,
            path: FieldPath::root(),
            instance: None,
        }
    }

    /// Create a required-but-absent error
    pub fn required(path: &FieldPath) -> Self {
        Self::new(ValidateReason::Required, "value is required").at(path.clone())
    }

    /// Create a wrong type error
    pub fn wrong_type(expected: KindTag, actual: &str, path: &FieldPath) -> Self {
        Self::new(
            ValidateReason::WrongType(expected),
            format!("expected {}, got {}", expected, actual),
        )
        .at(path.clone())
    }

    /// Create a custom rule failure
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(ValidateReason::Custom, message)
    }

    pub fn at(mut self, path: FieldPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_instance(mut self, instance: Option<&Instance>) -> Self {
        self.instance = instance.cloned();
        self
    }

    /// Fills value, path and owner only where they are still unset.
    pub(crate) fn annotate(
        mut self,
        value: serde_json::Value,
        path: &FieldPath,
        owner: Option<&Instance>,
    ) -> Self {
        if self.value.is_none() {
            self.value = Some(value);
        }
        if self.path.is_root() {
            self.path = path.clone();
        }
        if self.instance.is_none() {
            self.instance = owner.cloned();
        }
        self
    }

    pub fn reason(&self) -> ValidateReason {
        self.reason
    }

    /// Returns the reason code string
    pub fn code(&self) -> &'static str {
        self.reason.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.reason.code(), self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Failure reported by a custom validator.
///
/// A structured error is passed through (with missing context filled in);
/// anything else is wrapped as a `custom` validation error.
#[derive(Debug, Clone)]
pub enum ValidatorError {
    Structured(ValidationError),
    Message(String),
}

impl ValidatorError {
    pub(crate) fn into_validation(
        self,
        value: serde_json::Value,
        path: &FieldPath,
        owner: Option<&Instance>,
    ) -> ValidationError {
        match self {
            ValidatorError::Structured(err) => err.annotate(value, path, owner),
            ValidatorError::Message(msg) => {
                ValidationError::custom(msg).annotate(value, path, owner)
            }
        }
    }
}

impl From<ValidationError> for ValidatorError {
    fn from(err: ValidationError) -> Self {
        ValidatorError::Structured(err)
    }
}

impl From<String> for ValidatorError {
    fn from(msg: String) -> Self {
        ValidatorError::Message(msg)
    }
}

impl From<&str> for ValidatorError {
    fn from(msg: &str) -> Self {
        ValidatorError::Message(msg.to_string())
    }
}
