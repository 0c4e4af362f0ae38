//! Collection Contract Tests
//!
//! Both adapters must:
//! - Reject a second insert of the same identity, leaving the count unchanged
//! - Report a miss as `None`
//! - Fail delete of an absent instance with "document not found"

use std::sync::Arc;

use modeldb::{
    Collection, CollectionConfig, CollectionError, DocumentCollection, DocumentStore, Field,
    Instance, MemoryCollection, MemoryDocumentStore, Model, PlainOptions, PopulateSpec, Reference,
    Value,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn person_model() -> Arc<Model> {
    Model::builder("Person")
        .field("id", Field::string().required())
        .field("name", Field::string().required())
        .build()
}

async fn exercise_contract(collection: &dyn Collection) {
    let model = Arc::clone(collection.model());
    let alice = model.create(json!({"id": "42", "name": "Alice"})).unwrap();
    collection.insert(&alice).await.unwrap();

    let twin = model.create(json!({"id": "42", "name": "Other"})).unwrap();
    let err = collection.insert(&twin).await.unwrap_err();
    assert!(matches!(err, CollectionError::DuplicateKey(ref id) if id == "42"));
    assert_eq!(err.to_string(), "duplicate key: 42");

    let found = collection.find_by_id("42").await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(Value::from("Alice")));
    assert!(collection.find_by_id("nope").await.unwrap().is_none());

    collection.delete(&alice).await.unwrap();
    assert!(collection.find_by_id("42").await.unwrap().is_none());
    let err = collection.delete(&alice).await.unwrap_err();
    assert!(matches!(err, CollectionError::DocumentNotFound(_)));
}

// =============================================================================
// Contract
// =============================================================================

#[tokio::test]
async fn test_memory_collection_contract() {
    let collection = MemoryCollection::new("people", &person_model());
    exercise_contract(&collection).await;
}

#[tokio::test]
async fn test_document_collection_contract() {
    let store = Arc::new(MemoryDocumentStore::new());
    let collection = DocumentCollection::new("people", &person_model(), store);
    exercise_contract(&collection).await;
}

#[tokio::test]
async fn test_duplicate_leaves_count_unchanged() {
    let model = person_model();
    let memory = MemoryCollection::new("people", &model);
    let documents = DocumentCollection::new("people", &model, Arc::new(MemoryDocumentStore::new()));

    for collection in [&memory as &dyn Collection, &documents as &dyn Collection] {
        let first = model.create(json!({"id": "1", "name": "A"})).unwrap();
        let second = model.create(json!({"id": "1", "name": "B"})).unwrap();
        collection.insert(&first).await.unwrap();
        assert!(collection.insert(&second).await.is_err());
    }

    assert_eq!(memory.len().await, 1);
    assert_eq!(documents.count().unwrap(), 1);
}

#[tokio::test]
async fn test_rejects_invalid_and_foreign_instances() {
    let model = person_model();
    let memory = MemoryCollection::new("people", &model);

    let nameless = model.create(json!({"id": "1"})).unwrap();
    let err = memory.insert(&nameless).await.unwrap_err();
    match err {
        CollectionError::Invalid(inner) => assert_eq!(inner.path().to_string(), "name"),
        other => panic!("unexpected error {:?}", other),
    }

    let pet = Model::builder("Pet").field("id", Field::string()).build();
    let rex = pet.create(json!({"id": "rex"})).unwrap();
    let err = memory.insert(&rex).await.unwrap_err();
    assert!(matches!(err, CollectionError::ModelMismatch { .. }));
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_custom_identity_field() {
    let model = Model::builder("User")
        .field("email", Field::string().required())
        .build();
    let users = MemoryCollection::with_config(
        CollectionConfig::new("users").with_id_field("email"),
        &model,
    );
    assert_eq!(users.id_field(), "email");

    let ann = model.create(json!({"email": "ann@example.com"})).unwrap();
    users.insert(&ann).await.unwrap();
    let found = users.find_by_id("ann@example.com").await.unwrap().unwrap();
    assert!(Instance::same(&found, &ann));
}

#[tokio::test]
async fn test_concurrent_fetches() {
    let model = person_model();
    let people = Arc::new(MemoryCollection::new("people", &model));
    for i in 0..10 {
        let person = model
            .create(json!({"id": i.to_string(), "name": format!("P{}", i)}))
            .unwrap();
        people.insert(&person).await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..10 {
        let people = Arc::clone(&people);
        handles.push(tokio::spawn(async move {
            people.find_by_id(&i.to_string()).await.unwrap().is_some()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }
}

// =============================================================================
// Documents and References
// =============================================================================

#[tokio::test]
async fn test_documents_store_reference_ids() {
    let person = person_model();
    let people = Arc::new(MemoryCollection::new("people", &person));
    people
        .insert(&person.create(json!({"id": "42", "name": "Alice"})).unwrap())
        .await
        .unwrap();

    let people_ref: Arc<dyn Collection> = people.clone();
    let discussion = Model::builder("Discussion")
        .field("id", Field::string().required())
        .field("author", Field::reference_to(people_ref))
        .build();
    let discussions = DocumentCollection::new(
        "discussions",
        &discussion,
        Arc::new(MemoryDocumentStore::new()),
    );

    let thread = discussion.create(json!({"id": "d1", "author": "42"})).unwrap();
    thread.populate(&PopulateSpec::leaf()).await.unwrap();
    discussions.insert(&thread).await.unwrap();

    let stored = discussions.store().read("discussions", "d1").unwrap();
    assert_eq!(stored, Some(json!({"id": "d1", "author": "42"})));

    let loaded = discussions.find_by_id("d1").await.unwrap().unwrap();
    assert_eq!(
        loaded.get("author"),
        Some(Value::Ref(Reference::Id("42".into())))
    );

    loaded.populate(&PopulateSpec::fields(["author"])).await.unwrap();
    assert_eq!(
        loaded.to_plain(PlainOptions::default())["author"],
        json!({"id": "42", "name": "Alice"})
    );
}
