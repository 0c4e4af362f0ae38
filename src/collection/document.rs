//! Document-store collection
//!
//! Instances are persisted as plain documents (resolved references collapsed
//! to identifiers) and rehydrated on every read. Reads therefore return fresh
//! instances; identity is only preserved within one fetch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as Document;

use super::errors::{CollectionError, CollectionResult};
use super::{checked_identity, Collection, CollectionConfig};
use crate::model::{Instance, Model, PlainOptions};
use crate::observability::{log_event_with_fields, Event};
use crate::BoxFuture;

/// Trait for the document storage backend
pub trait DocumentStore: Send + Sync {
    /// Read a document by ID
    fn read(&self, collection: &str, id: &str) -> Result<Option<Document>, String>;

    /// Read several documents, one slot per ID
    fn read_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Option<Document>>, String> {
        ids.iter().map(|id| self.read(collection, id)).collect()
    }

    /// Write a document under a new ID. Returns false if the ID is taken.
    fn write_new(&self, collection: &str, id: &str, document: Document) -> Result<bool, String>;

    /// Delete a document. Returns false if it did not exist.
    fn remove(&self, collection: &str, id: &str) -> Result<bool, String>;

    /// Number of documents in a collection
    fn count(&self, collection: &str) -> Result<usize, String>;
}

/// Simple in-memory document store for testing
#[derive(Default)]
pub struct MemoryDocumentStore {
    data: RwLock<HashMap<String, HashMap<String, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, collection: &str, id: &str) -> Result<Option<Document>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn read_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Option<Document>>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        let coll = data.get(collection);
        Ok(ids
            .iter()
            .map(|id| coll.and_then(|c| c.get(id)).cloned())
            .collect())
    }

    fn write_new(&self, collection: &str, id: &str, document: Document) -> Result<bool, String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        let coll = data.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Ok(false);
        }
        coll.insert(id.to_string(), document);
        Ok(true)
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool, String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        Ok(data
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    fn count(&self, collection: &str) -> Result<usize, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(collection).map(|c| c.len()).unwrap_or(0))
    }
}

/// Collection persisting plain documents into a `DocumentStore`.
pub struct DocumentCollection<S: DocumentStore> {
    name: String,
    id_field: String,
    model: Arc<Model>,
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentCollection<S> {
    pub fn new(name: impl Into<String>, model: &Arc<Model>, store: Arc<S>) -> Self {
        Self::with_config(CollectionConfig::new(name), model, store)
    }

    pub fn with_config(config: CollectionConfig, model: &Arc<Model>, store: Arc<S>) -> Self {
        Self {
            id_field: config.resolve_id_field(model),
            name: config.name,
            model: Arc::clone(model),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Number of stored documents
    pub fn count(&self) -> CollectionResult<usize> {
        self.store.count(&self.name).map_err(CollectionError::Store)
    }

    fn hydrate(&self, document: Option<Document>) -> CollectionResult<Option<Instance>> {
        document
            .map(|doc| self.model.hydrate(doc).map_err(CollectionError::Hydrate))
            .transpose()
    }
}

impl<S: DocumentStore> Collection for DocumentCollection<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, CollectionResult<Option<Instance>>> {
        Box::pin(async move {
            let document = self.store.read(&self.name, id).map_err(CollectionError::Store)?;
            self.hydrate(document)
        })
    }

    fn find_by_ids<'a>(
        &'a self,
        ids: &'a [String],
    ) -> BoxFuture<'a, CollectionResult<Vec<Option<Instance>>>> {
        Box::pin(async move {
            let documents = self
                .store
                .read_many(&self.name, ids)
                .map_err(CollectionError::Store)?;
            documents.into_iter().map(|doc| self.hydrate(doc)).collect()
        })
    }

    fn insert<'a>(&'a self, instance: &'a Instance) -> BoxFuture<'a, CollectionResult<()>> {
        Box::pin(async move {
            let id = checked_identity(&self.model, &self.id_field, instance)?;
            instance.validate().await?;

            let document = instance.to_plain(PlainOptions::unpopulated());
            let created = self
                .store
                .write_new(&self.name, &id, document)
                .map_err(CollectionError::Store)?;
            if !created {
                log_event_with_fields(
                    Event::CollectionDuplicate,
                    &[("collection", self.name.as_str()), ("id", id.as_str())],
                );
                return Err(CollectionError::DuplicateKey(id));
            }

            log_event_with_fields(
                Event::CollectionInsert,
                &[("collection", self.name.as_str()), ("id", id.as_str())],
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, instance: &'a Instance) -> BoxFuture<'a, CollectionResult<()>> {
        Box::pin(async move {
            let id = checked_identity(&self.model, &self.id_field, instance)?;
            let removed = self
                .store
                .remove(&self.name, &id)
                .map_err(CollectionError::Store)?;
            if !removed {
                return Err(CollectionError::DocumentNotFound(id));
            }

            log_event_with_fields(
                Event::CollectionDelete,
                &[("collection", self.name.as_str()), ("id", id.as_str())],
            );
            Ok(())
        })
    }
}
