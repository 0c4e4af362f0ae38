//! Conversion of typed values to the plain transport form
//!
//! Walks the schema alongside the value, so object fields are emitted in
//! declaration order and undeclared keys never leak out. An instance that is
//! already on the current conversion path is emitted as its identifier, so
//! populated cycles terminate.

use std::collections::{BTreeMap, HashSet};

use serde_json::Map;

use super::types::{Field, FieldKind, SchemaMap};
use crate::model::{Instance, PlainOptions, Value};

/// Instances being converted, outermost first, keyed by handle address.
#[derive(Debug, Default)]
pub(crate) struct Ancestors(HashSet<usize>);

impl Ancestors {
    /// Marks `instance` as entered; false if it is already on the path.
    pub(crate) fn enter(&mut self, instance: &Instance) -> bool {
        self.0.insert(instance.address())
    }

    pub(crate) fn leave(&mut self, instance: &Instance) {
        self.0.remove(&instance.address());
    }
}

impl Field {
    /// Strips `value` of instances, references and dates.
    pub fn to_plain(&self, value: &Value, options: &PlainOptions) -> serde_json::Value {
        self.plain_in(value, options, &mut Ancestors::default())
    }

    pub(crate) fn plain_in(
        &self,
        value: &Value,
        options: &PlainOptions,
        ancestors: &mut Ancestors,
    ) -> serde_json::Value {
        match (&self.kind, value) {
            (FieldKind::Array(schema), Value::Array(items)) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| schema.element.plain_in(item, options, ancestors))
                    .collect(),
            ),
            (FieldKind::Object(schema), Value::Object(map)) => {
                plain_fields(&schema.schema, map, options, ancestors)
            }
            (FieldKind::Model(_), Value::Model(instance)) => instance.plain_in(options, ancestors),
            (FieldKind::Reference(_), Value::Ref(reference)) => {
                reference.plain_in(options, ancestors)
            }
            (_, value) => value.json_in(options, ancestors),
        }
    }
}

/// Converts the declared fields of `fields`; absent fields are omitted.
pub(crate) fn plain_fields(
    schema: &SchemaMap,
    fields: &BTreeMap<String, Value>,
    options: &PlainOptions,
    ancestors: &mut Ancestors,
) -> serde_json::Value {
    let mut out = Map::new();
    for (name, field) in schema.iter() {
        if let Some(value) = fields.get(name) {
            out.insert(name.to_string(), field.plain_in(value, options, ancestors));
        }
    }
    serde_json::Value::Object(out)
}
