//! Sanitization: raw input to typed value tree
//!
//! Sanitization checks shape only. Semantic constraints (bounds, enums,
//! required-ness, custom rules) belong to validation.
//!
//! - `Null` input is treated as absent
//! - Absent + required + `apply_defaults` synthesizes the declared default,
//!   or an empty container for array, object and model kinds
//! - Absent otherwise stays absent
//! - Any failure aborts the whole call; nothing partial is returned

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::errors::{FieldPath, KindTag, SanitizationError};
use super::types::{ArraySchema, Field, FieldKind, ReferenceSchema, SchemaMap};
use crate::model::{Instance, Model, ModelArray, PlainOptions, Reference, SanitizeOptions, Value};

impl Field {
    /// Converts a raw value into the typed value for this field.
    ///
    /// Returns `Ok(None)` when the field ends up absent.
    pub fn sanitize(
        &self,
        raw: Option<Value>,
        path: &FieldPath,
        owner: Option<&Instance>,
        options: &SanitizeOptions,
    ) -> Result<Option<Value>, SanitizationError> {
        match raw.filter(|value| !value.is_null()) {
            Some(value) => self.sanitize_present(value, path, owner, options).map(Some),
            None if self.required && options.apply_defaults => {
                self.synthesize(path, owner, options)
            }
            None => Ok(None),
        }
    }

    fn synthesize(
        &self,
        path: &FieldPath,
        owner: Option<&Instance>,
        options: &SanitizeOptions,
    ) -> Result<Option<Value>, SanitizationError> {
        if let Some(default) = &self.default {
            let value = default.produce();
            if value.is_null() {
                return Ok(None);
            }
            return self.sanitize_present(value, path, owner, options).map(Some);
        }

        match &self.kind {
            FieldKind::Array(schema) => Ok(Some(empty_array(schema))),
            FieldKind::Object(schema) => {
                let fields = sanitize_fields(
                    &schema.schema,
                    schema.strict,
                    BTreeMap::new(),
                    &BTreeMap::new(),
                    path,
                    owner,
                    options,
                )?;
                Ok(Some(Value::Object(fields)))
            }
            FieldKind::Model(model) => {
                let instance = model.instantiate(BTreeMap::new(), path, options)?;
                Ok(Some(Value::Model(instance)))
            }
            _ => Ok(None),
        }
    }

    fn sanitize_present(
        &self,
        value: Value,
        path: &FieldPath,
        owner: Option<&Instance>,
        options: &SanitizeOptions,
    ) -> Result<Value, SanitizationError> {
        match (&self.kind, value) {
            (FieldKind::Any, value) => Ok(value),
            (FieldKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldKind::Number(_), Value::Number(n)) => Ok(Value::Number(n)),
            (FieldKind::String(_), Value::String(s)) => Ok(Value::String(s)),
            (FieldKind::Date(_), value) => sanitize_date(value, path, owner),
            (FieldKind::Array(schema), value) => sanitize_array(schema, value, path, owner, options),
            (FieldKind::Object(schema), Value::Object(raw)) => sanitize_fields(
                &schema.schema,
                schema.strict,
                raw,
                &BTreeMap::new(),
                path,
                owner,
                options,
            )
            .map(Value::Object),
            (FieldKind::Model(model), value) => {
                sanitize_model(model, value, path, owner, options).map(Value::Model)
            }
            (FieldKind::Reference(schema), value) => {
                sanitize_reference(schema, value, path, owner, options)
            }
            (kind, value) => Err(mismatch(kind.tag(), &value, path, owner)),
        }
    }
}

/// Applies a field map to raw object input.
///
/// Starts from `existing` and returns the new map; the caller commits it.
/// In strict mode the first undeclared raw key (by iteration order) is rejected
/// before any field is touched.
pub(crate) fn sanitize_fields(
    schema: &SchemaMap,
    strict: bool,
    mut raw: BTreeMap<String, Value>,
    existing: &BTreeMap<String, Value>,
    path: &FieldPath,
    owner: Option<&Instance>,
    options: &SanitizeOptions,
) -> Result<BTreeMap<String, Value>, SanitizationError> {
    if strict {
        if let Some((key, value)) = raw.iter().find(|(key, _)| !schema.contains(key)) {
            return Err(SanitizationError::key_not_in_schema(key, path)
                .with_value(value.to_json(&PlainOptions::unpopulated()))
                .with_instance(owner));
        }
    }

    let mut fields = existing.clone();
    for (name, field) in schema.iter() {
        if options.replace {
            fields.remove(name);
        }

        let incoming = match raw.remove(name) {
            Some(value) => Some(value),
            // Omitted without replace: a stored value stays as it is.
            None if fields.contains_key(name) => continue,
            None => None,
        };

        match field.sanitize(incoming, &path.child(name), owner, options)? {
            Some(value) => {
                fields.insert(name.to_string(), value);
            }
            None => {
                fields.remove(name);
            }
        }
    }

    Ok(fields)
}

fn empty_array(schema: &ArraySchema) -> Value {
    match &schema.element.kind {
        FieldKind::Model(model) => Value::Models(ModelArray::new(Arc::clone(model))),
        _ => Value::Array(Vec::new()),
    }
}

fn mismatch(
    expected: KindTag,
    value: &Value,
    path: &FieldPath,
    owner: Option<&Instance>,
) -> SanitizationError {
    SanitizationError::wrong_type(expected, value.kind_name(), path)
        .with_value(value.to_json(&PlainOptions::unpopulated()))
        .with_instance(owner)
}

fn sanitize_date(
    value: Value,
    path: &FieldPath,
    owner: Option<&Instance>,
) -> Result<Value, SanitizationError> {
    let parsed = match &value {
        Value::Date(date) => Some(*date),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        Value::Number(millis) if millis.is_finite() => {
            Utc.timestamp_millis_opt(*millis as i64).single()
        }
        _ => None,
    };

    parsed
        .map(Value::Date)
        .ok_or_else(|| mismatch(KindTag::Date, &value, path, owner))
}

fn sanitize_array(
    schema: &ArraySchema,
    value: Value,
    path: &FieldPath,
    owner: Option<&Instance>,
    options: &SanitizeOptions,
) -> Result<Value, SanitizationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Models(array) => match &schema.element.kind {
            FieldKind::Model(model) if Arc::ptr_eq(array.model(), model) => {
                return Ok(Value::Models(array));
            }
            FieldKind::Model(model) => {
                return Err(
                    SanitizationError::model_mismatch(model.name(), array.model().name(), path)
                        .with_instance(owner),
                );
            }
            _ => array.into_instances().into_iter().map(Value::Model).collect(),
        },
        other => return Err(mismatch(KindTag::Array, &other, path, owner)),
    };

    let mut sanitized = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        // Absent elements are skipped rather than stored.
        if let Some(value) = schema
            .element
            .sanitize(Some(item), &path.index(index), owner, options)?
        {
            sanitized.push(value);
        }
    }

    match &schema.element.kind {
        FieldKind::Model(model) => {
            let instances = sanitized
                .into_iter()
                .filter_map(|value| match value {
                    Value::Model(instance) => Some(instance),
                    _ => None,
                })
                .collect();
            Ok(Value::Models(ModelArray::from_instances(
                Arc::clone(model),
                instances,
            )))
        }
        _ => Ok(Value::Array(sanitized)),
    }
}

fn sanitize_model(
    model: &Arc<Model>,
    value: Value,
    path: &FieldPath,
    owner: Option<&Instance>,
    options: &SanitizeOptions,
) -> Result<Instance, SanitizationError> {
    match value {
        Value::Model(instance) if Arc::ptr_eq(instance.model(), model) => Ok(instance),
        Value::Model(instance) => Err(SanitizationError::model_mismatch(
            model.name(),
            instance.model().name(),
            path,
        )
        .with_instance(owner)),
        Value::Object(raw) => model.instantiate(raw, path, options),
        other => Err(mismatch(KindTag::Object, &other, path, owner)),
    }
}

fn sanitize_reference(
    schema: &ReferenceSchema,
    value: Value,
    path: &FieldPath,
    owner: Option<&Instance>,
    options: &SanitizeOptions,
) -> Result<Value, SanitizationError> {
    match value {
        Value::String(id) | Value::Ref(Reference::Id(id)) => Ok(Value::Ref(Reference::Id(id))),
        Value::Model(instance) | Value::Ref(Reference::Resolved(instance)) => {
            let collection = schema.collection();
            if Arc::ptr_eq(instance.model(), collection.model()) {
                Ok(Value::Ref(Reference::Resolved(instance)))
            } else {
                Err(SanitizationError::model_mismatch(
                    collection.model().name(),
                    instance.model().name(),
                    path,
                )
                .with_instance(owner))
            }
        }
        Value::Object(raw) => {
            let collection = schema.collection();
            let instance = collection.model().instantiate(raw, path, options)?;
            Ok(Value::Ref(Reference::Resolved(instance)))
        }
        other => Err(mismatch(KindTag::Reference, &other, path, owner)),
    }
}
