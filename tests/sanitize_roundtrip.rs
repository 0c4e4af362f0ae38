//! Sanitize and To-Plain Tests
//!
//! - Plain output of sanitized input equals the input (schema keys only)
//! - Strict mode names the first undeclared key
//! - Defaults apply only to absent required fields on create
//! - Model arrays promote raw objects to instances

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modeldb::{Field, Instance, Model, PlainOptions, SanitizeOptions, SchemaMap, Value};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn comment_model() -> Arc<Model> {
    Model::builder("Comment")
        .field("text", Field::string().required())
        .field("votes", Field::number())
        .build()
}

fn post_model(comment: &Arc<Model>) -> Arc<Model> {
    Model::builder("Post")
        .field("id", Field::identifier())
        .field("title", Field::string().required())
        .field("published", Field::boolean())
        .field("created", Field::date())
        .field("tags", Field::array(Field::string()))
        .field(
            "meta",
            Field::object(
                SchemaMap::new()
                    .with("lang", Field::string())
                    .with("score", Field::number()),
            ),
        )
        .field("pinned", Field::model(comment))
        .field("comments", Field::array(Field::model(comment)).required())
        .build()
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_plain_round_trip() {
    let comment = comment_model();
    let post = post_model(&comment);

    let raw = json!({
        "id": "p1",
        "title": "Hello",
        "published": true,
        "created": "2024-01-02T03:04:05.000Z",
        "tags": ["a", "b"],
        "meta": {"lang": "en", "score": 2.5},
        "pinned": {"text": "first", "votes": 3},
        "comments": [{"text": "x"}, {"text": "y", "votes": 1}]
    });

    let instance = post.create(raw.clone()).unwrap();
    assert_eq!(instance.to_plain(PlainOptions::default()), raw);
}

#[test]
fn test_nested_values_are_instances() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post
        .create(json!({"title": "t", "pinned": {"text": "p"}, "comments": [{"text": "c"}]}))
        .unwrap();

    let pinned = instance.get("pinned").unwrap();
    assert!(Arc::ptr_eq(pinned.as_instance().unwrap().model(), &comment));

    let comments = instance.get("comments").unwrap();
    let comments = comments.as_models().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments.get(0).unwrap().get("text"), Some(Value::from("c")));
}

#[test]
fn test_get_returns_shared_nested_instance() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post.create(json!({"title": "t", "pinned": {"text": "p"}})).unwrap();

    let first = instance.get("pinned").unwrap().as_instance().unwrap().clone();
    first.set_field("votes", 9).unwrap();

    let second = instance.get("pinned").unwrap().as_instance().unwrap().clone();
    assert!(Instance::same(&first, &second));
    assert_eq!(second.get("votes"), Some(Value::Number(9.0)));
}

// =============================================================================
// Strict Mode
// =============================================================================

#[test]
fn test_strict_rejects_extra_key() {
    let model = Model::builder("Person")
        .field("name", Field::string())
        .build();

    let err = model.create(json!({"name": "Ann", "extra": 1})).unwrap_err();
    assert_eq!(err.code(), "key-not-in-schema");
    assert_eq!(err.path().to_string(), "extra");
    assert_eq!(err.value(), Some(&json!(1)));
}

#[test]
fn test_lenient_model_drops_extra_key() {
    let model = Model::builder("Person")
        .strict(false)
        .field("name", Field::string())
        .build();

    let instance = model.create(json!({"name": "Ann", "extra": 1})).unwrap();
    assert_eq!(instance.to_plain(PlainOptions::default()), json!({"name": "Ann"}));
}

#[test]
fn test_nested_error_path() {
    let comment = comment_model();
    let post = post_model(&comment);

    let err = post
        .create(json!({"title": "t", "comments": [{"text": "ok"}, {"text": 5}]}))
        .unwrap_err();
    assert_eq!(err.code(), "no-string");
    assert_eq!(err.path().to_string(), "comments[1].text");
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_defaults_on_create_only() {
    let comment = comment_model();
    let post = post_model(&comment);

    let created = post.create(json!({"title": "t"})).unwrap();
    assert_eq!(created.id().unwrap().len(), 36);
    assert!(created.get("comments").unwrap().as_models().unwrap().is_empty());
    assert!(!created.contains("tags"));

    let hydrated = post.hydrate(json!({"title": "t"})).unwrap();
    assert!(!hydrated.contains("id"));
    assert!(!hydrated.contains("comments"));
}

#[test]
fn test_update_keeps_omitted_fields() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post.create(json!({"id": "p", "title": "t", "tags": ["x"]})).unwrap();

    instance
        .set(json!({"title": "renamed"}), SanitizeOptions::update())
        .unwrap();
    assert_eq!(instance.id().as_deref(), Some("p"));
    assert_eq!(
        instance.get("tags").unwrap().to_json(&PlainOptions::default()),
        json!(["x"])
    );
}

#[test]
fn test_replace_resets_to_defaults() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post.create(json!({"id": "p", "title": "t", "tags": ["x"]})).unwrap();

    instance
        .set(json!({"id": "p", "title": "fresh"}), SanitizeOptions::replace())
        .unwrap();
    assert!(!instance.contains("tags"));
    assert_eq!(instance.get("title"), Some(Value::from("fresh")));
}

// =============================================================================
// Model Arrays
// =============================================================================

#[test]
fn test_set_field_promotes_raw_objects() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post.create(json!({"title": "t"})).unwrap();

    instance
        .set_field("comments", json!([{"text": "a"}, {"text": "b"}]))
        .unwrap();

    let comments = instance.get("comments").unwrap();
    let comments = comments.as_models().unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().all(|c| Arc::ptr_eq(c.model(), &comment)));
}

#[test]
fn test_model_array_mutation_then_store() {
    let comment = comment_model();
    let post = post_model(&comment);
    let instance = post.create(json!({"title": "t"})).unwrap();

    let mut comments = instance.get("comments").unwrap().as_models().unwrap().clone();
    comments.push(Value::from(json!({"text": "pushed"}))).unwrap();
    assert_eq!(comments.push("raw string").unwrap_err().code(), "no-object");

    instance.set_field("comments", Value::Models(comments)).unwrap();
    assert_eq!(
        instance.to_plain(PlainOptions::default())["comments"],
        json!([{"text": "pushed"}])
    );
}

#[test]
fn test_foreign_model_instance_rejected() {
    let comment = comment_model();
    let post = post_model(&comment);
    let other = Model::builder("Other").field("text", Field::string()).build();
    let stray = other.create(json!({"text": "x"})).unwrap();

    let instance = post.create(json!({"title": "t"})).unwrap();
    let err = instance.set_field("pinned", stray).unwrap_err();
    assert_eq!(err.code(), "model-mismatch");
    assert_eq!(err.path().to_string(), "pinned");
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn test_after_set_runs_per_set() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let model = Model::builder("Counter")
        .field("n", Field::number())
        .after_set(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let instance = model.create(json!({"n": 1})).unwrap();
    instance.set_field("n", 2).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // A rejected set does not reach the after hook
    assert!(instance.set_field("n", "three").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
