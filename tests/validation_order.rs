//! Validation Tests
//!
//! - The first violation in declaration order wins, whatever the timing
//! - Nested models report paths from the root and their own instance
//! - Custom validators see the value, path and owner

use std::sync::{Arc, Mutex};
use std::time::Duration;

use modeldb::schema::ValidatorError;
use modeldb::{Field, FieldPath, Instance, Model, SchemaMap, Value};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn delayed_failure(millis: u64, message: &'static str) -> Field {
    Field::number().validator(move |_, _, _| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Err(ValidatorError::from(message))
        })
    })
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_first_declared_field_wins() {
    let model = Model::builder("Pair")
        .field("a", delayed_failure(50, "a failed"))
        .field("b", delayed_failure(0, "b failed"))
        .build();
    let pair = model.create(json!({"a": 1, "b": 2})).unwrap();

    for _ in 0..3 {
        let err = pair.validate().await.unwrap_err();
        assert_eq!(err.path().to_string(), "a");
        assert_eq!(err.message(), "a failed");
    }
}

#[tokio::test]
async fn test_first_index_wins_in_arrays() {
    let field = Field::array(Field::number().validator(|value, _, _| {
        Box::pin(async move {
            let n = value.as_f64().unwrap_or_default();
            // Later elements finish first
            tokio::time::sleep(Duration::from_millis((40.0 - n * 10.0).max(0.0) as u64)).await;
            if n > 0.0 {
                Err(ValidatorError::from(format!("bad {}", n)))
            } else {
                Ok(())
            }
        })
    }));
    let model = Model::builder("List").field("items", field).build();
    let list = model.create(json!({"items": [0, 1, 2, 3]})).unwrap();

    let err = list.validate().await.unwrap_err();
    assert_eq!(err.path().to_string(), "items[1]");
    assert_eq!(err.message(), "bad 1");
}

#[tokio::test]
async fn test_builtin_checks_before_custom() {
    let model = Model::builder("Age")
        .field(
            "age",
            Field::number()
                .min(0.0)
                .check(|_| Err(ValidatorError::from("custom"))),
        )
        .build();

    let negative = model.create(json!({"age": -1})).unwrap();
    assert_eq!(negative.validate().await.unwrap_err().code(), "number-min");

    let positive = model.create(json!({"age": 5})).unwrap();
    assert_eq!(positive.validate().await.unwrap_err().code(), "custom");
}

// =============================================================================
// Nesting
// =============================================================================

#[tokio::test]
async fn test_required_inside_object() {
    let model = Model::builder("Doc")
        .field(
            "meta",
            Field::object(SchemaMap::new().with("title", Field::string().required())),
        )
        .build();
    let doc = model.create(json!({"meta": {}})).unwrap();

    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.code(), "required");
    assert_eq!(err.path().to_string(), "meta.title");
    assert!(Instance::same(err.instance().unwrap(), &doc));
}

#[tokio::test]
async fn test_nested_model_reports_own_instance() {
    let comment = Model::builder("Comment")
        .field("text", Field::string().required())
        .build();
    let post = Model::builder("Post")
        .field("comments", Field::array(Field::model(&comment)))
        .build();

    let instance = post
        .create(json!({"comments": [{"text": "fine"}, {}]}))
        .unwrap();
    let err = instance.validate().await.unwrap_err();
    assert_eq!(err.code(), "required");
    assert_eq!(err.path().to_string(), "comments[1].text");

    let comments = instance.get("comments").unwrap();
    let second = comments.as_models().unwrap().get(1).unwrap().clone();
    assert!(Instance::same(err.instance().unwrap(), &second));
}

#[tokio::test]
async fn test_array_length_before_elements() {
    let model = Model::builder("Tags")
        .field(
            "tags",
            Field::array(Field::string().min_length(3)).max_length(2),
        )
        .build();
    let tags = model.create(json!({"tags": ["a", "b", "c"]})).unwrap();

    let err = tags.validate().await.unwrap_err();
    assert_eq!(err.code(), "array-max-length");
    assert_eq!(err.path().to_string(), "tags");
}

// =============================================================================
// Custom Validators
// =============================================================================

#[tokio::test]
async fn test_custom_validator_receives_context() {
    let seen: Arc<Mutex<Vec<(Value, FieldPath, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let model = Model::builder("Named")
        .field(
            "name",
            Field::string().validator(move |value, path, owner| {
                sink.lock().unwrap().push((value, path, owner.is_some()));
                Box::pin(async { Ok(()) })
            }),
        )
        .build();

    let named = model.create(json!({"name": "Ann"})).unwrap();
    named.validate().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Value::from("Ann"));
    assert_eq!(seen[0].1.to_string(), "name");
    assert!(seen[0].2);
}

#[tokio::test]
async fn test_structured_custom_error_is_annotated() {
    let model = Model::builder("Even")
        .field(
            "n",
            Field::number().check(|value| {
                if value.as_f64().map(|n| n % 2.0 == 0.0).unwrap_or(false) {
                    Ok(())
                } else {
                    Err(modeldb::ValidationError::custom("must be even").into())
                }
            }),
        )
        .build();

    let odd = model.create(json!({"n": 3})).unwrap();
    let err = odd.validate().await.unwrap_err();
    assert_eq!(err.code(), "custom");
    assert_eq!(err.path().to_string(), "n");
    assert_eq!(err.value(), Some(&json!(3)));
    assert!(Instance::same(err.instance().unwrap(), &odd));
}

#[tokio::test]
async fn test_valid_instance_passes() {
    let model = Model::builder("Person")
        .field("id", Field::identifier())
        .field("name", Field::string().required().min_length(1))
        .field("age", Field::number().integer().min(0.0))
        .field("role", Field::string().one_of(["admin", "user"]))
        .build();

    let person = model
        .create(json!({"name": "Ann", "age": 30, "role": "user"}))
        .unwrap();
    assert!(person.validate().await.is_ok());
}
