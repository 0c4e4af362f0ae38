//! Validation of sanitized value trees
//!
//! Validation semantics:
//! - Required fields must be present
//! - Values must have the declared shape
//! - Bounds are checked before descending into containers
//! - A custom validator runs last, only after the built-in checks pass
//!
//! Siblings (object fields, array elements) are validated concurrently. The
//! reported error is always the first one in declaration or index order, no
//! matter which sibling finished first.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;

use super::errors::{FieldPath, KindTag, ValidateReason, ValidationError};
use super::types::{ArraySchema, DateRules, Field, FieldKind, NumberRules, SchemaMap, StringRules};
use crate::model::{date_to_string, Instance, PlainOptions, Value};
use crate::BoxFuture;

impl Field {
    /// Validates a (possibly absent) value against this field.
    ///
    /// `owner` is the instance holding the value, attached to any error.
    pub fn validate<'a>(
        &'a self,
        value: Option<&'a Value>,
        path: FieldPath,
        owner: Option<&'a Instance>,
    ) -> BoxFuture<'a, Result<(), ValidationError>> {
        Box::pin(async move {
            let value = match value.filter(|value| !value.is_null()) {
                Some(value) => value,
                None if self.required => {
                    return Err(ValidationError::required(&path).with_instance(owner));
                }
                None => return Ok(()),
            };

            self.check_value(value, &path, owner)
                .map_err(|err| annotate(err, value, &path, owner))?;
            self.validate_children(value, &path, owner).await?;

            if let Some(validator) = &self.validator {
                validator(value.clone(), path.clone(), owner.cloned())
                    .await
                    .map_err(|err| err.into_validation(plain(value), &path, owner))?;
            }
            Ok(())
        })
    }

    /// Shape and bound checks that need no recursion.
    fn check_value(
        &self,
        value: &Value,
        path: &FieldPath,
        owner: Option<&Instance>,
    ) -> Result<(), ValidationError> {
        let mismatch = || ValidationError::wrong_type(self.tag(), value.kind_name(), path);

        match (&self.kind, value) {
            (FieldKind::Any, _) => Ok(()),
            (FieldKind::Boolean, Value::Bool(_)) => Ok(()),
            (FieldKind::Number(rules), Value::Number(n)) => check_number(rules, *n),
            (FieldKind::String(rules), Value::String(s)) => check_string(rules, s),
            (FieldKind::Date(rules), Value::Date(date)) => check_date(rules, date),
            (FieldKind::Array(schema), value) => match value.elements() {
                Some(items) => check_length(schema, items.len()),
                None => Err(mismatch()),
            },
            (FieldKind::Object(_), Value::Object(_)) => Ok(()),
            (FieldKind::Model(model), Value::Model(instance)) => {
                if Arc::ptr_eq(instance.model(), model) {
                    Ok(())
                } else {
                    Err(ValidationError::wrong_type(KindTag::Model, instance.model().name(), path))
                }
            }
            (FieldKind::Reference(_), Value::Ref(_)) => Ok(()),
            _ => Err(mismatch()),
        }
        .map_err(|err| err.with_instance(owner))
    }

    /// Recurses into arrays, objects and nested models.
    async fn validate_children(
        &self,
        value: &Value,
        path: &FieldPath,
        owner: Option<&Instance>,
    ) -> Result<(), ValidationError> {
        match (&self.kind, value) {
            (FieldKind::Array(schema), value) => {
                let items = value.elements().unwrap_or_default();
                let checks = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| schema.element.validate(Some(item), path.index(index), owner));
                first_error(join_all(checks).await)
            }
            (FieldKind::Object(schema), Value::Object(map)) => {
                validate_fields(&schema.schema, map, path.clone(), owner).await
            }
            // A nested instance owns its own fields.
            (FieldKind::Model(_), Value::Model(instance)) => {
                instance.validate_at(path.clone()).await
            }
            _ => Ok(()),
        }
    }
}

/// Validates every declared field of `fields` concurrently.
pub(crate) fn validate_fields<'a>(
    schema: &'a SchemaMap,
    fields: &'a BTreeMap<String, Value>,
    path: FieldPath,
    owner: Option<&'a Instance>,
) -> BoxFuture<'a, Result<(), ValidationError>> {
    Box::pin(async move {
        let checks = schema
            .iter()
            .map(|(name, field)| field.validate(fields.get(name), path.child(name), owner));
        first_error(join_all(checks).await)
    })
}

fn first_error(results: Vec<Result<(), ValidationError>>) -> Result<(), ValidationError> {
    results.into_iter().collect()
}

fn plain(value: &Value) -> serde_json::Value {
    value.to_json(&PlainOptions::unpopulated())
}

fn annotate(
    err: ValidationError,
    value: &Value,
    path: &FieldPath,
    owner: Option<&Instance>,
) -> ValidationError {
    err.annotate(plain(value), path, owner)
}

fn check_number(rules: &NumberRules, n: f64) -> Result<(), ValidationError> {
    if let Some(min) = rules.min {
        if n < min {
            return Err(ValidationError::new(
                ValidateReason::NumberMin,
                format!("{} is less than the minimum {}", n, min),
            ));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            return Err(ValidationError::new(
                ValidateReason::NumberMax,
                format!("{} is greater than the maximum {}", n, max),
            ));
        }
    }
    if rules.integer && n.fract() != 0.0 {
        return Err(ValidationError::new(
            ValidateReason::NumberInteger,
            format!("{} is not an integer", n),
        ));
    }
    Ok(())
}

fn check_string(rules: &StringRules, s: &str) -> Result<(), ValidationError> {
    if let Some(allowed) = &rules.one_of {
        if !allowed.iter().any(|candidate| candidate == s) {
            return Err(ValidationError::new(
                ValidateReason::StringEnum,
                format!("'{}' is not one of [{}]", s, allowed.join(", ")),
            ));
        }
    }

    let len = s.chars().count();
    if let Some(min) = rules.min {
        if len < min {
            return Err(ValidationError::new(
                ValidateReason::StringMin,
                format!("length {} is shorter than {}", len, min),
            ));
        }
    }
    if let Some(max) = rules.max {
        if len > max {
            return Err(ValidationError::new(
                ValidateReason::StringMax,
                format!("length {} is longer than {}", len, max),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.is_match(s) {
            return Err(ValidationError::new(
                ValidateReason::StringRegex,
                format!("'{}' does not match /{}/", s, pattern.as_str()),
            ));
        }
    }
    Ok(())
}

fn check_date(rules: &DateRules, date: &chrono::DateTime<chrono::Utc>) -> Result<(), ValidationError> {
    if let Some(min) = &rules.min {
        if date < min {
            return Err(ValidationError::new(
                ValidateReason::DateMin,
                format!("{} is before {}", date_to_string(date), date_to_string(min)),
            ));
        }
    }
    if let Some(max) = &rules.max {
        if date > max {
            return Err(ValidationError::new(
                ValidateReason::DateMax,
                format!("{} is after {}", date_to_string(date), date_to_string(max)),
            ));
        }
    }
    Ok(())
}

fn check_length(schema: &ArraySchema, len: usize) -> Result<(), ValidationError> {
    if let Some(min) = schema.min_length {
        if len < min {
            return Err(ValidationError::new(
                ValidateReason::ArrayMinLength,
                format!("{} elements, at least {} required", len, min),
            ));
        }
    }
    if let Some(max) = schema.max_length {
        if len > max {
            return Err(ValidationError::new(
                ValidateReason::ArrayMaxLength,
                format!("{} elements, at most {} allowed", len, max),
            ));
        }
    }
    Ok(())
}
