//! Schema node definitions
//!
//! Supported kinds:
//! - any: passes through untouched
//! - boolean, number, string, date: scalars with optional bounds
//! - array: homogeneous, with an element schema and length bounds
//! - object: nested field map without model identity
//! - model: nested instance of another model type
//! - reference: identifier or resolved instance from a collection

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::errors::{FieldPath, KindTag, ValidatorError};
use crate::collection::Collection;
use crate::identifier::{self, IdGenerator};
use crate::model::{Instance, Model, Value};
use crate::BoxFuture;

/// Future returned by a custom validator
pub type ValidatorFuture = BoxFuture<'static, Result<(), ValidatorError>>;

/// Async custom rule run after the built-in constraints pass.
pub type CustomValidator =
    Arc<dyn Fn(Value, FieldPath, Option<Instance>) -> ValidatorFuture + Send + Sync>;

/// Lazily evaluated accessor to the collection a reference points into.
pub type CollectionAccessor = Arc<dyn Fn() -> Arc<dyn Collection> + Send + Sync>;

/// Value synthesized for an absent required field.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(serde_json::Value),
    Generator(Arc<dyn Fn() -> serde_json::Value + Send + Sync>),
}

impl DefaultValue {
    /// Evaluates the default. A generator is invoked once per call.
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Literal(raw) => Value::from(raw.clone()),
            DefaultValue::Generator(generate) => Value::from(generate()),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(raw) => write!(f, "Literal({})", raw),
            DefaultValue::Generator(_) => write!(f, "Generator"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NumberRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub one_of: Option<Vec<String>>,
    /// Minimum length in characters
    pub min: Option<usize>,
    /// Maximum length in characters
    pub max: Option<usize>,
    pub pattern: Option<Regex>,
}

#[derive(Debug, Clone, Default)]
pub struct DateRules {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub element: Box<Field>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub schema: Arc<SchemaMap>,
    pub strict: bool,
}

#[derive(Clone)]
pub struct ReferenceSchema {
    collection: CollectionAccessor,
}

impl ReferenceSchema {
    /// Evaluates the accessor
    pub fn collection(&self) -> Arc<dyn Collection> {
        (self.collection)()
    }
}

impl fmt::Debug for ReferenceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceSchema")
    }
}

/// Kind-specific part of a schema node
#[derive(Debug, Clone)]
pub enum FieldKind {
    Any,
    Boolean,
    Number(NumberRules),
    String(StringRules),
    Date(DateRules),
    Array(ArraySchema),
    Object(ObjectSchema),
    Model(Arc<Model>),
    Reference(ReferenceSchema),
}

impl FieldKind {
    pub fn tag(&self) -> KindTag {
        match self {
            FieldKind::Any => KindTag::Any,
            FieldKind::Boolean => KindTag::Boolean,
            FieldKind::Number(_) => KindTag::Number,
            FieldKind::String(_) => KindTag::String,
            FieldKind::Date(_) => KindTag::Date,
            FieldKind::Array(_) => KindTag::Array,
            FieldKind::Object(_) => KindTag::Object,
            FieldKind::Model(_) => KindTag::Model,
            FieldKind::Reference(_) => KindTag::Reference,
        }
    }
}

/// One field's type and constraints. Immutable once placed in a schema.
#[derive(Clone)]
pub struct Field {
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) validator: Option<CustomValidator>,
}

impl Field {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            validator: None,
        }
    }

    pub fn any() -> Self {
        Self::of(FieldKind::Any)
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn number() -> Self {
        Self::of(FieldKind::Number(NumberRules::default()))
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String(StringRules::default()))
    }

    pub fn date() -> Self {
        Self::of(FieldKind::Date(DateRules::default()))
    }

    /// Homogeneous array of `element`
    pub fn array(element: Field) -> Self {
        Self::of(FieldKind::Array(ArraySchema {
            element: Box::new(element),
            min_length: None,
            max_length: None,
        }))
    }

    /// Nested object with its own strict field map
    pub fn object(schema: SchemaMap) -> Self {
        Self::of(FieldKind::Object(ObjectSchema {
            schema: Arc::new(schema),
            strict: true,
        }))
    }

    /// Nested instance of `model`
    pub fn model(model: &Arc<Model>) -> Self {
        Self::of(FieldKind::Model(Arc::clone(model)))
    }

    /// Reference into a collection resolved lazily on first use
    pub fn reference<F>(accessor: F) -> Self
    where
        F: Fn() -> Arc<dyn Collection> + Send + Sync + 'static,
    {
        Self::of(FieldKind::Reference(ReferenceSchema {
            collection: Arc::new(accessor),
        }))
    }

    /// Reference into an already constructed collection
    pub fn reference_to(collection: Arc<dyn Collection>) -> Self {
        Self::reference(move || Arc::clone(&collection))
    }

    /// Required string defaulting to a freshly generated identifier
    pub fn identifier() -> Self {
        Self::identifier_with(identifier::uuid_generator())
    }

    /// Required string defaulting to the output of `generator`
    pub fn identifier_with(generator: IdGenerator) -> Self {
        Self::string()
            .required()
            .default_with(move || serde_json::Value::String(generator()))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(DefaultValue::Literal(value));
        self
    }

    pub fn default_with<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(generate)));
        self
    }

    /// Attaches an async custom validator
    pub fn validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(Value, FieldPath, Option<Instance>) -> ValidatorFuture + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validate));
        self
    }

    /// Attaches a synchronous custom rule
    pub fn check<F>(self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ValidatorError> + Send + Sync + 'static,
    {
        let check = Arc::new(check);
        self.validator(move |value, _path, _owner| {
            let result = check(&value);
            Box::pin(async move { result })
        })
    }

    /// Lower bound for numbers. Other kinds ignore it (debug builds panic).
    pub fn min(mut self, min: f64) -> Self {
        self.constrain("min", matches!(self.kind, FieldKind::Number(_)));
        if let FieldKind::Number(rules) = &mut self.kind {
            rules.min = Some(min);
        }
        self
    }

    /// Upper bound for numbers. Other kinds ignore it (debug builds panic).
    pub fn max(mut self, max: f64) -> Self {
        self.constrain("max", matches!(self.kind, FieldKind::Number(_)));
        if let FieldKind::Number(rules) = &mut self.kind {
            rules.max = Some(max);
        }
        self
    }

    /// Number fields only
    pub fn integer(mut self) -> Self {
        self.constrain("integer", matches!(self.kind, FieldKind::Number(_)));
        if let FieldKind::Number(rules) = &mut self.kind {
            rules.integer = true;
        }
        self
    }

    /// Minimum length of a string (characters) or array (elements)
    pub fn min_length(mut self, min: usize) -> Self {
        self.constrain("min_length", self.has_length());
        match &mut self.kind {
            FieldKind::String(rules) => rules.min = Some(min),
            FieldKind::Array(schema) => schema.min_length = Some(min),
            _ => {}
        }
        self
    }

    /// Maximum length of a string (characters) or array (elements)
    pub fn max_length(mut self, max: usize) -> Self {
        self.constrain("max_length", self.has_length());
        match &mut self.kind {
            FieldKind::String(rules) => rules.max = Some(max),
            FieldKind::Array(schema) => schema.max_length = Some(max),
            _ => {}
        }
        self
    }

    /// Restricts a string to the listed values
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constrain("one_of", matches!(self.kind, FieldKind::String(_)));
        if let FieldKind::String(rules) = &mut self.kind {
            rules.one_of = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    /// String fields only
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.constrain("pattern", matches!(self.kind, FieldKind::String(_)));
        if let FieldKind::String(rules) = &mut self.kind {
            rules.pattern = Some(pattern);
        }
        self
    }

    /// Earliest accepted date. Date fields only.
    pub fn after(mut self, min: DateTime<Utc>) -> Self {
        self.constrain("after", matches!(self.kind, FieldKind::Date(_)));
        if let FieldKind::Date(rules) = &mut self.kind {
            rules.min = Some(min);
        }
        self
    }

    /// Latest accepted date. Date fields only.
    pub fn before(mut self, max: DateTime<Utc>) -> Self {
        self.constrain("before", matches!(self.kind, FieldKind::Date(_)));
        if let FieldKind::Date(rules) = &mut self.kind {
            rules.max = Some(max);
        }
        self
    }

    /// Toggles rejection of undeclared keys on an object field
    pub fn strict(mut self, strict: bool) -> Self {
        self.constrain("strict", matches!(self.kind, FieldKind::Object(_)));
        if let FieldKind::Object(schema) = &mut self.kind {
            schema.strict = strict;
        }
        self
    }

    fn has_length(&self) -> bool {
        matches!(self.kind, FieldKind::String(_) | FieldKind::Array(_))
    }

    /// Constraint setters are no-ops on kinds they do not apply to; debug
    /// builds catch the mismatch.
    fn constrain(&self, setter: &str, applies: bool) {
        debug_assert!(applies, "`{}` has no effect on {} fields", setter, self.tag());
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn declared_default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Whether populate can descend into this field
    pub fn is_populatable(&self) -> bool {
        match &self.kind {
            FieldKind::Reference(_) | FieldKind::Object(_) | FieldKind::Model(_) => true,
            FieldKind::Array(schema) => schema.element.is_populatable(),
            _ => false,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Field name to schema node, in declaration order. Keys are unique.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    fields: Vec<(String, Field)>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing an earlier declaration of the same name in place
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, field)| field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_schema_map_keeps_declaration_order() {
        let schema = SchemaMap::new()
            .with("b", Field::string())
            .with("a", Field::number())
            .with("c", Field::boolean());
        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_schema_map_redeclaration_replaces_in_place() {
        let schema = SchemaMap::new()
            .with("a", Field::string())
            .with("b", Field::string())
            .with("a", Field::number());
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("a").unwrap().tag(), KindTag::Number);
        assert_eq!(schema.names().next(), Some("a"));
    }

    #[test]
    fn test_constraint_setters_apply_to_matching_kind() {
        let field = Field::string().min_length(2).max_length(5).one_of(["ab", "abc"]);
        match field.kind() {
            FieldKind::String(rules) => {
                assert_eq!(rules.min, Some(2));
                assert_eq!(rules.max, Some(5));
                assert_eq!(rules.one_of.as_ref().unwrap().len(), 2);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let field = Field::array(Field::number()).min_length(1);
        match field.kind() {
            FieldKind::Array(schema) => assert_eq!(schema.min_length, Some(1)),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "`min` has no effect on string fields")]
    fn test_number_bound_on_string_panics() {
        let _ = Field::string().min(3.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "`strict` has no effect on array fields")]
    fn test_strict_on_array_panics() {
        let _ = Field::array(Field::string()).strict(false);
    }

    #[test]
    fn test_generator_default_invoked_per_produce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let field = Field::number().required().default_with(move || {
            json!(counter.fetch_add(1, Ordering::SeqCst))
        });

        let default = field.declared_default().unwrap();
        assert_eq!(default.produce(), Value::Number(0.0));
        assert_eq!(default.produce(), Value::Number(1.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_populatable_kinds() {
        assert!(Field::object(SchemaMap::new()).is_populatable());
        assert!(!Field::string().is_populatable());
        assert!(!Field::array(Field::number()).is_populatable());
        assert!(Field::array(Field::object(SchemaMap::new())).is_populatable());
    }
}
