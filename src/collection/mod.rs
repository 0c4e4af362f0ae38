//! Collections of model instances
//!
//! A collection stores instances of one model type, keyed by an identity
//! field. Identity values are unique: at most one insert succeeds per value.
//!
//! Reference fields resolve through the `Collection` trait, so any store can
//! back them. Two adapters are provided:
//! - `MemoryCollection`: instances kept in memory, identity preserved
//! - `DocumentCollection`: plain documents in a `DocumentStore`, rehydrated on read

mod document;
mod errors;
mod memory;

pub use document::{DocumentCollection, DocumentStore, MemoryDocumentStore};
pub use errors::{CollectionError, CollectionResult};
pub use memory::MemoryCollection;

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::model::{number_to_json, Instance, Model, Value};
use crate::BoxFuture;

/// Store of model instances consumed by reference fields.
///
/// Implementations must serve concurrent reads safely. A miss is `Ok(None)`,
/// never an error.
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Model type of the stored instances
    fn model(&self) -> &Arc<Model>;

    /// Field holding the identity value
    fn id_field(&self) -> &str {
        self.model().id_field()
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, CollectionResult<Option<Instance>>>;

    /// Positional lookup: the result has one slot per requested id.
    fn find_by_ids<'a>(
        &'a self,
        ids: &'a [String],
    ) -> BoxFuture<'a, CollectionResult<Vec<Option<Instance>>>> {
        Box::pin(async move {
            join_all(ids.iter().map(|id| self.find_by_id(id)))
                .await
                .into_iter()
                .collect()
        })
    }

    /// Stores an instance; fails with `DuplicateKey` if the identity is taken.
    fn insert<'a>(&'a self, instance: &'a Instance) -> BoxFuture<'a, CollectionResult<()>>;

    /// Removes an instance; fails with `DocumentNotFound` if it is not stored.
    fn delete<'a>(&'a self, instance: &'a Instance) -> BoxFuture<'a, CollectionResult<()>>;
}

/// Naming and keying of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    /// Identity field; `None` uses the model's own identity field.
    pub id_field: Option<String>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: None,
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Identity field to use for `model`.
    pub fn resolve_id_field(&self, model: &Model) -> String {
        self.id_field
            .clone()
            .unwrap_or_else(|| model.id_field().to_string())
    }
}

/// Reads the identity value of `instance` from `field` as a string.
pub(crate) fn identity_of(instance: &Instance, field: &str) -> Option<String> {
    match instance.get(field)? {
        Value::String(id) => Some(id),
        Value::Number(n) => Some(number_to_json(n).to_string()),
        _ => None,
    }
}

/// Checks that `instance` belongs to `model` and returns its identity value.
pub(crate) fn checked_identity(
    model: &Arc<Model>,
    id_field: &str,
    instance: &Instance,
) -> CollectionResult<String> {
    if !Arc::ptr_eq(instance.model(), model) {
        return Err(CollectionError::ModelMismatch {
            expected: model.name().to_string(),
            actual: instance.model().name().to_string(),
        });
    }
    identity_of(instance, id_field).ok_or_else(|| CollectionError::MissingIdentity(id_field.to_string()))
}
