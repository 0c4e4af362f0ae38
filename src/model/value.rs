//! Typed value tree
//!
//! `Value` is both the raw input form (anything convertible from
//! `serde_json::Value`, plus already built instances) and the sanitized form
//! stored on instances. Absence is `Option::None`, never a variant.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number};

use super::array::ModelArray;
use super::instance::Instance;
use super::options::PlainOptions;
use crate::schema::Ancestors;

/// A reference field value: a foreign identifier or the resolved instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Id(String),
    Resolved(Instance),
}

impl Reference {
    /// Identifier of the referenced entity, whichever view is held
    pub fn id(&self) -> Option<String> {
        match self {
            Reference::Id(id) => Some(id.clone()),
            Reference::Resolved(instance) => instance.id(),
        }
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Reference::Id(_) => None,
            Reference::Resolved(instance) => Some(instance),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    pub(crate) fn to_plain(&self, options: &PlainOptions) -> serde_json::Value {
        self.plain_in(options, &mut Ancestors::default())
    }

    pub(crate) fn plain_in(
        &self,
        options: &PlainOptions,
        ancestors: &mut Ancestors,
    ) -> serde_json::Value {
        match self {
            Reference::Id(id) => serde_json::Value::String(id.clone()),
            Reference::Resolved(instance) if options.unpopulate => instance.plain_id(),
            Reference::Resolved(instance) => instance.plain_in(options, ancestors),
        }
    }
}

/// A node of the typed value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    /// Array whose element schema is a model type
    Models(ModelArray),
    Object(BTreeMap<String, Value>),
    Model(Instance),
    Ref(Reference),
}

impl Value {
    /// Kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) | Value::Models(_) => "array",
            Value::Object(_) => "object",
            Value::Model(_) => "model",
            Value::Ref(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    /// The instance held directly or through a resolved reference
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Model(instance) => Some(instance),
            Value::Ref(Reference::Resolved(instance)) => Some(instance),
            _ => None,
        }
    }

    pub fn as_models(&self) -> Option<&ModelArray> {
        match self {
            Value::Models(array) => Some(array),
            _ => None,
        }
    }

    /// Elements of either array representation
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.clone()),
            Value::Models(array) => Some(array.iter().cloned().map(Value::Model).collect()),
            _ => None,
        }
    }

    /// Schema-less conversion to the plain transport form.
    pub fn to_json(&self, options: &PlainOptions) -> serde_json::Value {
        self.json_in(options, &mut Ancestors::default())
    }

    pub(crate) fn json_in(
        &self,
        options: &PlainOptions,
        ancestors: &mut Ancestors,
    ) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(date_to_string(d)),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(|v| v.json_in(options, ancestors)).collect(),
            ),
            Value::Models(array) => serde_json::Value::Array(
                array
                    .iter()
                    .map(|instance| instance.plain_in(options, ancestors))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.json_in(options, ancestors));
                }
                serde_json::Value::Object(out)
            }
            Value::Model(instance) => instance.plain_in(options, ancestors),
            Value::Ref(reference) => reference.plain_in(options, ancestors),
        }
    }
}

/// Numbers are stored as `f64`, so the plain form is normalized: integral
/// values in `[i64::MIN, i64::MAX)` serialize as JSON integers (`2.0` becomes
/// `2`), everything else as a float. Non-finite values become `null`.
pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    // 2^63 is exactly `i64::MAX as f64` and would saturate in the cast.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

pub(crate) fn date_to_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<serde_json::Value> for Value {
    fn from(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Model(instance)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}
