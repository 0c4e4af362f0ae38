//! Reference resolution
//!
//! Population runs in two phases. The plan phase walks the value tree,
//! fetches references and computes new field values without touching any
//! instance. Only when every branch has succeeded are the planned updates
//! committed, so a failure anywhere leaves all instances as they were.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;

use super::spec::PopulateSpec;
use crate::collection::Collection;
use crate::model::{Instance, ModelError, ModelResult, Reference, Value};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{ArraySchema, Field, FieldKind, FieldPath, ReferenceSchema, SchemaMap};
use crate::BoxFuture;

static LEAF: PopulateSpec = PopulateSpec::Leaf;

/// Field updates for one instance, applied at commit time.
type Commit = (Instance, Vec<(String, Value)>);

/// Planned result for one value.
struct Populated {
    value: Value,
    commits: Vec<Commit>,
}

impl Populated {
    fn new(value: Value) -> Self {
        Self {
            value,
            commits: Vec::new(),
        }
    }

    fn with_commits(value: Value, commits: Vec<Commit>) -> Self {
        Self { value, commits }
    }
}

fn commit_all(commits: Vec<Commit>) {
    for (instance, updates) in commits {
        instance.commit(updates);
    }
}

/// Populates `instance` in place according to `spec`.
pub(crate) async fn populate_instance(
    instance: &Instance,
    spec: &PopulateSpec,
    path: FieldPath,
) -> ModelResult<()> {
    let commits = plan_instance(instance, spec, path).await?;
    commit_all(commits);
    Ok(())
}

impl Field {
    /// Resolves references inside `value` and returns the populated value.
    ///
    /// Nested instances reachable from `value` are updated in place.
    pub async fn populate(
        &self,
        value: &Value,
        spec: &PopulateSpec,
        path: FieldPath,
    ) -> ModelResult<Value> {
        let populated = plan_value(self, value, spec, path).await?;
        commit_all(populated.commits);
        Ok(populated.value)
    }
}

fn plan_instance<'a>(
    instance: &'a Instance,
    spec: &'a PopulateSpec,
    path: FieldPath,
) -> BoxFuture<'a, ModelResult<Vec<Commit>>> {
    Box::pin(async move {
        let model = Arc::clone(instance.model());
        let fields = instance.snapshot();

        let (updates, mut commits) = plan_fields(model.schema(), &fields, spec, &path).await?;
        if !updates.is_empty() {
            commits.push((instance.clone(), updates));
        }
        Ok(commits)
    })
}

/// Plans every requested field of a field map concurrently.
///
/// Unknown names fail before anything is fetched. Requested fields with no
/// stored value are skipped.
fn plan_fields<'a>(
    schema: &'a SchemaMap,
    fields: &'a BTreeMap<String, Value>,
    spec: &'a PopulateSpec,
    path: &'a FieldPath,
) -> BoxFuture<'a, ModelResult<(Vec<(String, Value)>, Vec<Commit>)>> {
    Box::pin(async move {
        let targets: Vec<(&str, &Field, &PopulateSpec)> = match spec {
            PopulateSpec::Leaf => schema
                .iter()
                .filter(|(_, field)| field.is_populatable())
                .map(|(name, field)| (name, field, &LEAF))
                .collect(),
            PopulateSpec::Fields(requested) => {
                let mut targets = Vec::with_capacity(requested.len());
                for (name, nested) in requested {
                    let field = schema
                        .get(name)
                        .ok_or_else(|| ModelError::KeyNotInSchema(name.clone()))?;
                    targets.push((name.as_str(), field, nested));
                }
                targets
            }
        };

        let jobs = targets.into_iter().filter_map(|(name, field, nested)| {
            let value = fields.get(name)?;
            let path = path.child(name);
            Some(async move {
                plan_value(field, value, nested, path)
                    .await
                    .map(|populated| (name, populated))
            })
        });

        let mut updates = Vec::new();
        let mut commits = Vec::new();
        for result in join_all(jobs).await {
            let (name, populated) = result?;
            updates.push((name.to_string(), populated.value));
            commits.extend(populated.commits);
        }
        Ok((updates, commits))
    })
}

fn plan_value<'a>(
    field: &'a Field,
    value: &'a Value,
    spec: &'a PopulateSpec,
    path: FieldPath,
) -> BoxFuture<'a, ModelResult<Populated>> {
    Box::pin(async move {
        if !field.is_populatable() {
            return Err(ModelError::CannotPopulate(field.tag().as_str()));
        }

        match (field.kind(), value) {
            (FieldKind::Reference(schema), Value::Ref(reference)) => {
                plan_reference(schema, reference, spec, path).await
            }
            (FieldKind::Array(schema), value) => plan_array(schema, value, spec, path).await,
            (FieldKind::Object(schema), Value::Object(map)) => {
                let (updates, commits) = plan_fields(&schema.schema, map, spec, &path).await?;
                let mut map = map.clone();
                map.extend(updates);
                Ok(Populated::with_commits(Value::Object(map), commits))
            }
            (FieldKind::Model(_), Value::Model(instance)) => {
                let commits = plan_instance(instance, spec, path).await?;
                Ok(Populated::with_commits(value.clone(), commits))
            }
            _ => Ok(Populated::new(value.clone())),
        }
    })
}

async fn plan_reference(
    schema: &ReferenceSchema,
    reference: &Reference,
    spec: &PopulateSpec,
    path: FieldPath,
) -> ModelResult<Populated> {
    let instance = match reference {
        // Already resolved: identity is kept.
        Reference::Resolved(instance) => instance.clone(),
        Reference::Id(id) => {
            let collection = schema.collection();
            fetch_one(collection.as_ref(), id, &path).await?
        }
    };

    let commits = match spec {
        PopulateSpec::Leaf => Vec::new(),
        PopulateSpec::Fields(_) => plan_instance(&instance, spec, path).await?,
    };
    Ok(Populated::with_commits(
        Value::Ref(Reference::Resolved(instance)),
        commits,
    ))
}

async fn fetch_one(collection: &dyn Collection, id: &str, path: &FieldPath) -> ModelResult<Instance> {
    let path = path.to_string();
    log_event_with_fields(
        Event::PopulateFetch,
        &[("collection", collection.name()), ("ids", "1"), ("path", path.as_str())],
    );

    match collection.find_by_id(id).await? {
        Some(instance) => Ok(instance),
        None => {
            log_event_with_fields(
                Event::PopulateMiss,
                &[("collection", collection.name()), ("id", id), ("path", path.as_str())],
            );
            Err(ModelError::IdNotFound(id.to_string()))
        }
    }
}

async fn plan_array(
    schema: &ArraySchema,
    value: &Value,
    spec: &PopulateSpec,
    path: FieldPath,
) -> ModelResult<Populated> {
    if let (FieldKind::Reference(reference), Value::Array(items)) = (schema.element.kind(), value) {
        return plan_reference_array(reference, items, spec, path).await;
    }

    let items = value
        .elements()
        .ok_or(ModelError::CannotPopulate(value.kind_name()))?;
    let jobs = items
        .iter()
        .enumerate()
        .map(|(index, item)| plan_value(&schema.element, item, spec, path.index(index)));

    let mut populated = Vec::with_capacity(items.len());
    let mut commits = Vec::new();
    for result in join_all(jobs).await {
        let element = result?;
        populated.push(element.value);
        commits.extend(element.commits);
    }

    // Model arrays keep their instances; the updates land on them at commit.
    let value = match value {
        Value::Models(_) => value.clone(),
        _ => Value::Array(populated),
    };
    Ok(Populated::with_commits(value, commits))
}

/// Resolves every identifier of a reference array with one batched fetch.
async fn plan_reference_array(
    schema: &ReferenceSchema,
    items: &[Value],
    spec: &PopulateSpec,
    path: FieldPath,
) -> ModelResult<Populated> {
    let pending: Vec<(usize, String)> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Ref(Reference::Id(id)) => Some((index, id.clone())),
            _ => None,
        })
        .collect();

    let mut resolved = items.to_vec();
    if !pending.is_empty() {
        let collection = schema.collection();
        let ids: Vec<String> = pending.iter().map(|(_, id)| id.clone()).collect();

        let count = ids.len().to_string();
        let path_str = path.to_string();
        log_event_with_fields(
            Event::PopulateFetch,
            &[
                ("collection", collection.name()),
                ("ids", count.as_str()),
                ("path", path_str.as_str()),
            ],
        );

        let found = collection.find_by_ids(&ids).await?;
        for (slot, (index, id)) in pending.iter().enumerate() {
            match found.get(slot).cloned().flatten() {
                Some(instance) => resolved[*index] = Value::Ref(Reference::Resolved(instance)),
                None => {
                    log_event_with_fields(
                        Event::PopulateMiss,
                        &[
                            ("collection", collection.name()),
                            ("id", id.as_str()),
                            ("path", path_str.as_str()),
                        ],
                    );
                    return Err(ModelError::IdNotFound(id.clone()));
                }
            }
        }
    }

    let mut commits = Vec::new();
    if let PopulateSpec::Fields(_) = spec {
        let jobs = resolved.iter().enumerate().filter_map(|(index, item)| match item {
            Value::Ref(Reference::Resolved(instance)) => {
                Some(plan_instance(instance, spec, path.index(index)))
            }
            _ => None,
        });
        for result in join_all(jobs).await {
            commits.extend(result?);
        }
    }

    Ok(Populated::with_commits(Value::Array(resolved), commits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::model::{Model, PlainOptions};
    use serde_json::json;

    async fn people() -> Arc<MemoryCollection> {
        let person = Model::builder("Person")
            .field("id", Field::string().required())
            .field("name", Field::string().required())
            .build();
        let people = Arc::new(MemoryCollection::new("people", &person));
        for (id, name) in [("a", "Ann"), ("c", "Cid")] {
            let instance = person.create(json!({"id": id, "name": name})).unwrap();
            people.insert(&instance).await.unwrap();
        }
        people
    }

    fn reference(people: &Arc<MemoryCollection>) -> Field {
        let collection: Arc<dyn Collection> = Arc::clone(people) as Arc<dyn Collection>;
        Field::reference_to(collection)
    }

    #[tokio::test]
    async fn test_field_populate_resolves_reference() {
        let people = people().await;
        let field = reference(&people);
        let value = Value::Ref(Reference::Id("a".into()));

        let populated = field
            .populate(&value, &PopulateSpec::Leaf, FieldPath::root())
            .await
            .unwrap();
        let instance = populated.as_instance().unwrap();
        assert_eq!(instance.to_plain(PlainOptions::default()), json!({"id": "a", "name": "Ann"}));
    }

    #[tokio::test]
    async fn test_missing_id_fails() {
        let people = people().await;
        let field = reference(&people);
        let value = Value::Ref(Reference::Id("zzz".into()));

        let err = field
            .populate(&value, &PopulateSpec::Leaf, FieldPath::root())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Id `zzz` not found");
    }

    #[tokio::test]
    async fn test_reference_array_is_all_or_nothing() {
        let people = people().await;
        let field = Field::array(reference(&people));
        let value = Value::Array(
            ["a", "missing", "c"]
                .iter()
                .map(|id| Value::Ref(Reference::Id(id.to_string())))
                .collect(),
        );

        let err = field
            .populate(&value, &PopulateSpec::Leaf, FieldPath::root())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::IdNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_scalar_field_cannot_populate() {
        let err = Field::string()
            .populate(&Value::from("x"), &PopulateSpec::Leaf, FieldPath::root())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot populate type string");
    }

    #[tokio::test]
    async fn test_object_populates_nested_references() {
        let people = people().await;
        let field = Field::object(
            SchemaMap::new()
                .with("owner", reference(&people))
                .with("label", Field::string()),
        );
        let mut map = BTreeMap::new();
        map.insert("owner".to_string(), Value::Ref(Reference::Id("c".into())));
        map.insert("label".to_string(), Value::from("x"));

        let populated = field
            .populate(&Value::Object(map), &PopulateSpec::Leaf, FieldPath::root())
            .await
            .unwrap();
        let owner = populated.as_object().unwrap()["owner"].as_instance().unwrap().clone();
        assert_eq!(owner.get("name"), Some(Value::from("Cid")));
    }
}
