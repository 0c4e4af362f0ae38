//! Auto-instantiating array of model instances
//!
//! Every insertion routes through `to_model`: raw objects are promoted to
//! instances of the element model, instances of another model are rejected.
//! Bulk insertions convert every value before the array is touched.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use super::definition::Model;
use super::instance::Instance;
use super::options::{PlainOptions, SanitizeOptions};
use super::value::{Reference, Value};
use crate::schema::{FieldPath, KindTag, SanitizationError};

/// Homogeneous array whose element schema is a model type.
#[derive(Debug, Clone)]
pub struct ModelArray {
    model: Arc<Model>,
    items: Vec<Instance>,
}

impl ModelArray {
    /// Creates an empty array for `model`.
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            items: Vec::new(),
        }
    }

    /// Items must already be instances of `model`.
    pub(crate) fn from_instances(model: Arc<Model>, items: Vec<Instance>) -> Self {
        Self { model, items }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Instance] {
        &self.items
    }

    pub fn into_instances(self) -> Vec<Instance> {
        self.items
    }

    /// Converts a value into an instance of the element model.
    pub fn to_model(&self, value: impl Into<Value>) -> Result<Instance, SanitizationError> {
        self.convert(value.into(), &FieldPath::root())
    }

    fn convert(&self, value: Value, path: &FieldPath) -> Result<Instance, SanitizationError> {
        match value {
            Value::Model(instance) | Value::Ref(Reference::Resolved(instance)) => {
                if Arc::ptr_eq(instance.model(), &self.model) {
                    Ok(instance)
                } else {
                    Err(SanitizationError::model_mismatch(
                        self.model.name(),
                        instance.model().name(),
                        path,
                    ))
                }
            }
            Value::Object(raw) => self.model.instantiate(raw, path, &SanitizeOptions::create()),
            Value::Null => self
                .model
                .instantiate(BTreeMap::new(), path, &SanitizeOptions::create()),
            other => Err(SanitizationError::wrong_type(KindTag::Object, other.kind_name(), path)
                .with_value(other.to_json(&PlainOptions::unpopulated()))),
        }
    }

    fn convert_all<I>(&self, values: I, first_index: usize) -> Result<Vec<Instance>, SanitizationError>
    where
        I: IntoIterator<Item = Value>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(offset, value)| self.convert(value, &FieldPath::root().index(first_index + offset)))
            .collect()
    }

    /// Appends one element.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), SanitizationError> {
        let instance = self.convert(value.into(), &FieldPath::root().index(self.items.len()))?;
        self.items.push(instance);
        Ok(())
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), SanitizationError> {
        let index = index.min(self.items.len());
        let instance = self.convert(value.into(), &FieldPath::root().index(index))?;
        self.items.insert(index, instance);
        Ok(())
    }

    /// Appends every value, or none if any fails to convert.
    pub fn extend<I, V>(&mut self, values: I) -> Result<(), SanitizationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let converted = self.convert_all(values.into_iter().map(Into::into), self.items.len())?;
        self.items.extend(converted);
        Ok(())
    }

    /// Replaces `range` with `values` and returns the removed instances.
    ///
    /// The range is clamped to the current length.
    pub fn splice<I, V>(&mut self, range: Range<usize>, values: I) -> Result<Vec<Instance>, SanitizationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let end = range.end.min(self.items.len());
        let start = range.start.min(end);
        let converted = self.convert_all(values.into_iter().map(Into::into), start)?;
        Ok(self.items.splice(start..end, converted).collect())
    }

    /// Sets every slot to the same instance.
    pub fn fill(&mut self, value: impl Into<Value>) -> Result<(), SanitizationError> {
        let instance = self.convert(value.into(), &FieldPath::root())?;
        for slot in self.items.iter_mut() {
            *slot = instance.clone();
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Instance> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn pop(&mut self) -> Option<Instance> {
        self.items.pop()
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl PartialEq for ModelArray {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.model, &other.model) && self.items == other.items
    }
}

impl<'a> IntoIterator for &'a ModelArray {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
