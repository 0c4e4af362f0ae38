//! Model instances
//!
//! An `Instance` is a shared handle: clones point at the same entity, and
//! `Instance::same` compares identity. Field values live behind a lock that is
//! only held for snapshot and commit, never across an `.await`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::definition::Model;
use super::errors::ModelResult;
use super::options::{PlainOptions, SanitizeOptions};
use super::value::{number_to_json, Reference, Value};
use crate::observability::{log_event_with_fields, Event};
use crate::populate::{populate_instance, PopulateSpec};
use crate::schema::{
    plain_fields, sanitize_fields, validate_fields, Ancestors, FieldKind, FieldPath, KindTag,
    SanitizationError, ValidationError,
};
use crate::BoxFuture;

struct InstanceInner {
    model: Arc<Model>,
    fields: RwLock<BTreeMap<String, Value>>,
}

/// Handle to one entity of a model type.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl Instance {
    pub(crate) fn new(model: Arc<Model>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                model,
                fields: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Whether both handles point at the same entity.
    pub fn same(a: &Instance, b: &Instance) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.inner.model
    }

    /// Address of the shared entity, stable for the handle's lifetime.
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.inner.fields.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.inner.fields.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a field, absent fields yield `None`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Copy of every stored field.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read().clone()
    }

    /// Identity value rendered as a string.
    pub fn id(&self) -> Option<String> {
        let id_field = self.model().id_field();
        match self.read().get(id_field)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(n) => Some(number_to_json(*n).to_string()),
            _ => None,
        }
    }

    /// Sanitizes `raw` (an object) into this instance.
    ///
    /// Without `replace`, fields omitted from `raw` keep their value.
    /// Nothing is committed if any field fails.
    pub fn set(
        &self,
        raw: impl Into<Value>,
        options: SanitizeOptions,
    ) -> Result<(), SanitizationError> {
        let root = FieldPath::root();
        let result = match raw.into() {
            Value::Object(map) => self.apply(map, &root, &options),
            Value::Null => self.apply(BTreeMap::new(), &root, &options),
            other => Err(
                SanitizationError::wrong_type(KindTag::Object, other.kind_name(), &root)
                    .with_instance(Some(self)),
            ),
        };

        if let Err(err) = &result {
            let path = err.path().to_string();
            log_event_with_fields(
                Event::SanitizeRejected,
                &[
                    ("model", self.model().name()),
                    ("code", err.code()),
                    ("path", path.as_str()),
                ],
            );
        }
        result
    }

    /// Sanitizes and stores a single field. `Value::Null` unsets it.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<(), SanitizationError> {
        if !self.model().schema().contains(name) {
            return Err(SanitizationError::key_not_in_schema(name, &FieldPath::root())
                .with_instance(Some(self)));
        }

        let mut raw = BTreeMap::new();
        raw.insert(name.to_string(), value.into());
        self.set(Value::Object(raw), SanitizeOptions::update())
    }

    /// The set algorithm: before hooks, sanitize, commit, after hooks.
    pub(crate) fn apply(
        &self,
        mut raw: BTreeMap<String, Value>,
        path: &FieldPath,
        options: &SanitizeOptions,
    ) -> Result<(), SanitizationError> {
        let model = Arc::clone(self.model());

        for hook in model.before_set_hooks() {
            hook(self, &mut raw, options);
        }

        let existing = self.snapshot();
        let fields = sanitize_fields(
            model.schema(),
            model.is_strict(),
            raw,
            &existing,
            path,
            Some(self),
            options,
        )?;
        *self.write() = fields;

        for hook in model.after_set_hooks() {
            hook(self);
        }
        Ok(())
    }

    /// Overwrites the given fields in one step. Values are already sanitized.
    pub(crate) fn commit(&self, updates: Vec<(String, Value)>) {
        let mut fields = self.write();
        for (name, value) in updates {
            fields.insert(name, value);
        }
    }

    /// Checks every constraint; reports the first violation.
    pub async fn validate(&self) -> Result<(), ValidationError> {
        let result = self.validate_at(FieldPath::root()).await;
        if let Err(err) = &result {
            let path = err.path().to_string();
            log_event_with_fields(
                Event::ValidationFailed,
                &[
                    ("model", self.model().name()),
                    ("code", err.code()),
                    ("path", path.as_str()),
                ],
            );
        }
        result
    }

    pub(crate) fn validate_at(&self, path: FieldPath) -> BoxFuture<'_, Result<(), ValidationError>> {
        Box::pin(async move {
            let model = Arc::clone(self.model());
            let fields = self.snapshot();
            validate_fields(model.schema(), &fields, path, Some(self)).await
        })
    }

    /// Resolves the references named by `spec`.
    ///
    /// Updates are committed only when every requested field resolved.
    pub async fn populate(&self, spec: &PopulateSpec) -> ModelResult<()> {
        populate_instance(self, spec, FieldPath::root()).await
    }

    /// Whether a reference field (or every element of a reference array) is resolved.
    pub fn is_populated(&self, name: &str) -> bool {
        match self.get(name) {
            Some(Value::Ref(reference)) => reference.is_resolved(),
            Some(Value::Array(items)) => {
                !items.is_empty()
                    && items
                        .iter()
                        .all(|item| matches!(item, Value::Ref(Reference::Resolved(_))))
            }
            _ => false,
        }
    }

    /// Collapses resolved references in a field back to identifiers.
    ///
    /// Returns whether anything changed.
    pub fn depopulate(&self, name: &str) -> bool {
        let Some(field) = self.model().schema().get(name) else {
            return false;
        };
        let is_reference = match field.kind() {
            FieldKind::Reference(_) => true,
            FieldKind::Array(schema) => matches!(schema.element.kind(), FieldKind::Reference(_)),
            _ => false,
        };
        if !is_reference {
            return false;
        }

        // Identifiers are read with no guard held: a reference may point back here.
        let (collapsed, changed) = match self.get(name) {
            Some(Value::Ref(mut reference)) => {
                let changed = collapse(&mut reference);
                (Value::Ref(reference), changed)
            }
            Some(Value::Array(mut items)) => {
                let changed = items.iter_mut().fold(false, |changed, item| match item {
                    Value::Ref(reference) => collapse(reference) || changed,
                    _ => changed,
                });
                (Value::Array(items), changed)
            }
            _ => return false,
        };

        if changed {
            self.write().insert(name.to_string(), collapsed);
        }
        changed
    }

    /// Schema-directed conversion to the plain transport form.
    ///
    /// An instance reached again through its own references is emitted as its
    /// identifier.
    pub fn to_plain(&self, options: PlainOptions) -> serde_json::Value {
        self.plain_in(&options, &mut Ancestors::default())
    }

    pub(crate) fn plain_in(
        &self,
        options: &PlainOptions,
        ancestors: &mut Ancestors,
    ) -> serde_json::Value {
        if !ancestors.enter(self) {
            return self.plain_id();
        }
        let model = Arc::clone(self.model());
        let fields = self.snapshot();
        let plain = plain_fields(model.schema(), &fields, options, ancestors);
        ancestors.leave(self);
        plain
    }

    /// Identity value in plain form, `null` when unset.
    pub(crate) fn plain_id(&self) -> serde_json::Value {
        self.id()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn collapse(reference: &mut Reference) -> bool {
    let id = match reference {
        Reference::Resolved(instance) => instance.id(),
        Reference::Id(_) => None,
    };
    match id {
        Some(id) => {
            *reference = Reference::Id(id);
            true
        }
        None => false,
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Instance::same(self, other)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self.inner.fields.try_read() {
            Ok(fields) => fields.get(self.model().id_field()).cloned().map(Ok),
            Err(_) => Some(Err("<locked>")),
        };
        // Rendered after the guard is dropped.
        let id = id.map(|value| match value {
            Ok(value) => value.to_json(&PlainOptions::unpopulated()).to_string(),
            Err(locked) => locked.to_string(),
        });
        f.debug_struct("Instance")
            .field("model", &self.model().name())
            .field("id", &id)
            .finish()
    }
}
