//! Model type definitions
//!
//! A model type is built once by `ModelBuilder` and is immutable afterwards:
//! its schema map, options and hook lists are shared by reference with every
//! instance. Deriving a model with `Model::extend` copies the base definition
//! at that moment; later changes to either side do not leak.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::instance::Instance;
use super::options::{ModelOptions, SanitizeOptions};
use super::value::Value;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{Field, FieldPath, KindTag, SanitizationError, SchemaMap};

/// Runs before sanitization and may rewrite the raw input.
pub type BeforeSetHook =
    Arc<dyn Fn(&Instance, &mut BTreeMap<String, Value>, &SanitizeOptions) + Send + Sync>;

/// Runs after the sanitized fields were committed.
pub type AfterSetHook = Arc<dyn Fn(&Instance) + Send + Sync>;

/// A model type: name, schema map, options and set hooks.
pub struct Model {
    name: String,
    schema: Arc<SchemaMap>,
    options: ModelOptions,
    before_set: Vec<BeforeSetHook>,
    after_set: Vec<AfterSetHook>,
}

impl Model {
    /// Starts a new model definition.
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            schema: SchemaMap::new(),
            options: ModelOptions::default(),
            before_set: Vec::new(),
            after_set: Vec::new(),
        }
    }

    /// Starts a definition that inherits `base`'s fields, options and hooks.
    pub fn extend(base: &Model, name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            schema: base.schema.as_ref().clone(),
            options: base.options.clone(),
            before_set: base.before_set.clone(),
            after_set: base.after_set.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn id_field(&self) -> &str {
        &self.options.id_field
    }

    pub fn is_strict(&self) -> bool {
        self.options.strict
    }

    pub(crate) fn before_set_hooks(&self) -> &[BeforeSetHook] {
        &self.before_set
    }

    pub(crate) fn after_set_hooks(&self) -> &[AfterSetHook] {
        &self.after_set
    }

    /// Builds a new instance from raw input, applying defaults.
    pub fn create(self: &Arc<Self>, raw: impl Into<Value>) -> Result<Instance, SanitizationError> {
        self.construct(raw.into(), &SanitizeOptions::create())
    }

    /// Builds an instance from stored data without synthesizing defaults.
    pub fn hydrate(self: &Arc<Self>, raw: impl Into<Value>) -> Result<Instance, SanitizationError> {
        self.construct(raw.into(), &SanitizeOptions::update())
    }

    /// An instance with no fields set.
    pub fn empty(self: &Arc<Self>) -> Instance {
        Instance::new(Arc::clone(self))
    }

    fn construct(
        self: &Arc<Self>,
        raw: Value,
        options: &SanitizeOptions,
    ) -> Result<Instance, SanitizationError> {
        let root = FieldPath::root();
        let result = match raw {
            Value::Object(map) => self.instantiate(map, &root, options),
            Value::Null => self.instantiate(BTreeMap::new(), &root, options),
            other => Err(SanitizationError::wrong_type(KindTag::Object, other.kind_name(), &root)),
        };

        if let Err(err) = &result {
            let path = err.path().to_string();
            log_event_with_fields(
                Event::SanitizeRejected,
                &[("model", self.name()), ("code", err.code()), ("path", path.as_str())],
            );
        }
        result
    }

    /// Sanitizes `raw` into a fresh instance; errors carry paths under `path`.
    pub(crate) fn instantiate(
        self: &Arc<Self>,
        raw: BTreeMap<String, Value>,
        path: &FieldPath,
        options: &SanitizeOptions,
    ) -> Result<Instance, SanitizationError> {
        let instance = Instance::new(Arc::clone(self));
        instance.apply(raw, path, options)?;
        Ok(instance)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("fields", &self.schema.names().collect::<Vec<_>>())
            .field("strict", &self.options.strict)
            .finish()
    }
}

/// Accumulates a model definition. `build` freezes it.
pub struct ModelBuilder {
    name: String,
    schema: SchemaMap,
    options: ModelOptions,
    before_set: Vec<BeforeSetHook>,
    after_set: Vec<AfterSetHook>,
}

impl ModelBuilder {
    /// Declares a field; redeclaring a name replaces it.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.schema.insert(name, field);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.options.id_field = name.into();
        self
    }

    pub fn before_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &mut BTreeMap<String, Value>, &SanitizeOptions) + Send + Sync + 'static,
    {
        self.before_set.push(Arc::new(hook));
        self
    }

    pub fn after_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) + Send + Sync + 'static,
    {
        self.after_set.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> Arc<Model> {
        let field_count = self.schema.len().to_string();
        log_event_with_fields(
            Event::ModelDefined,
            &[("model", self.name.as_str()), ("fields", field_count.as_str())],
        );

        Arc::new(Model {
            name: self.name,
            schema: Arc::new(self.schema),
            options: self.options,
            before_set: self.before_set,
            after_set: self.after_set,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_freezes_schema() {
        let model = Model::builder("Person")
            .field("id", Field::identifier())
            .field("name", Field::string().required())
            .build();

        assert_eq!(model.name(), "Person");
        assert_eq!(model.schema().len(), 2);
        assert_eq!(model.id_field(), "id");
        assert!(model.is_strict());
    }

    #[test]
    fn test_extend_copies_without_leaking() {
        let base = Model::builder("Base")
            .field("name", Field::string())
            .build();
        let derived = Model::extend(&base, "Derived")
            .field("extra", Field::number())
            .build();

        assert_eq!(derived.schema().len(), 2);
        assert_eq!(base.schema().len(), 1);
        assert!(!base.schema().contains("extra"));
    }

    #[test]
    fn test_extend_inherits_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let base = Model::builder("Base")
            .field("name", Field::string())
            .after_set(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let derived = Model::extend(&base, "Derived").build();

        derived.create(json!({"name": "x"})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_rejects_non_object() {
        let model = Model::builder("Thing").build();
        let err = model.create(json!([1, 2])).unwrap_err();
        assert_eq!(err.code(), "no-object");
    }

    #[test]
    fn test_create_applies_defaults_hydrate_does_not() {
        let model = Model::builder("Counter")
            .field("count", Field::number().required().default_value(json!(0)))
            .build();

        let created = model.create(json!({})).unwrap();
        assert_eq!(created.get("count"), Some(Value::Number(0.0)));

        let hydrated = model.hydrate(json!({})).unwrap();
        assert_eq!(hydrated.get("count"), None);
    }
}
