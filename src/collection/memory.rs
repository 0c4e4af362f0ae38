//! In-memory collection
//!
//! Stores instance handles directly, so a fetch returns the very instance
//! that was inserted. Each entry is keyed by the identity value read at insert
//! time; later edits to a stored instance's identity field do not re-key it.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::errors::{CollectionError, CollectionResult};
use super::{checked_identity, Collection, CollectionConfig};
use crate::model::{Instance, Model};
use crate::observability::{log_event_with_fields, Event};
use crate::BoxFuture;

/// Array-backed collection of instances of one model type.
pub struct MemoryCollection {
    name: String,
    id_field: String,
    model: Arc<Model>,
    items: RwLock<Vec<(String, Instance)>>,
}

impl MemoryCollection {
    /// Create an empty collection keyed by the model's identity field
    pub fn new(name: impl Into<String>, model: &Arc<Model>) -> Self {
        Self::with_config(CollectionConfig::new(name), model)
    }

    pub fn with_config(config: CollectionConfig, model: &Arc<Model>) -> Self {
        Self {
            id_field: config.resolve_id_field(model),
            name: config.name,
            model: Arc::clone(model),
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Every stored instance, in insertion order
    pub async fn all(&self) -> Vec<Instance> {
        self.items
            .read()
            .await
            .iter()
            .map(|(_, instance)| instance.clone())
            .collect()
    }

    /// Stored identity keys, in insertion order
    pub async fn ids(&self) -> Vec<String> {
        self.items.read().await.iter().map(|(id, _)| id.clone()).collect()
    }

    fn lookup(items: &[(String, Instance)], id: &str) -> Option<Instance> {
        items
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, instance)| instance.clone())
    }
}

impl Collection for MemoryCollection {
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
            let items = self.items.read().await;
            Ok(Self::lookup(&items, id))
        })
    }

    fn find_by_ids<'a>(
        &'a self,
        ids: &'a [String],
    ) -> BoxFuture<'a, CollectionResult<Vec<Option<Instance>>>> {
        Box::pin(async move {
            let items = self.items.read().await;
            Ok(ids.iter().map(|id| Self::lookup(&items, id)).collect())
        })
    }

    fn insert<'a>(&'a self, instance: &'a Instance) -> BoxFuture<'a, CollectionResult<()>> {
        Box::pin(async move {
            let id = checked_identity(&self.model, &self.id_field, instance)?;
            instance.validate().await?;

            // Duplicate check and push happen under one write lock.
            let mut items = self.items.write().await;
            if items.iter().any(|(key, _)| *key == id) {
                log_event_with_fields(
                    Event::CollectionDuplicate,
                    &[("collection", self.name.as_str()), ("id", id.as_str())],
                );
                return Err(CollectionError::DuplicateKey(id));
            }
            items.push((id.clone(), instance.clone()));

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

            // The stored handle wins over its current identity value.
            let mut items = self.items.write().await;
            let index = items
                .iter()
                .position(|(_, item)| Instance::same(item, instance))
                .or_else(|| items.iter().position(|(key, _)| *key == id))
                .ok_or_else(|| CollectionError::DocumentNotFound(id.clone()))?;
            items.remove(index);

            log_event_with_fields(
                Event::CollectionDelete,
                &[("collection", self.name.as_str()), ("id", id.as_str())],
            );
            Ok(())
        })
    }
}
