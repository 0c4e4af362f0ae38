//! modeldb - A schema-driven data-modeling engine
//!
//! Raw input flows through a fixed pipeline:
//!
//! raw → sanitize → instance → (set) → validate → populate → to_plain
//!
//! - `schema`: field kinds, constraints, sanitize / validate / to-plain
//! - `model`: model types, instances, value tree, model arrays
//! - `populate`: reference resolution against collections
//! - `collection`: the store contract and two adapters
//! - `observability`: structured JSON event logging

pub mod collection;
pub mod identifier;
pub mod model;
pub mod observability;
pub mod populate;
pub mod schema;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by async trait methods and recursive algorithms
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use collection::{
    Collection, CollectionConfig, CollectionError, CollectionResult, DocumentCollection,
    DocumentStore, MemoryCollection, MemoryDocumentStore,
};
pub use model::{
    Instance, Model, ModelArray, ModelBuilder, ModelError, ModelOptions, ModelResult,
    PlainOptions, Reference, SanitizeOptions, Value,
};
pub use populate::PopulateSpec;
pub use schema::{Field, FieldPath, SanitizationError, SchemaMap, ValidationError};
