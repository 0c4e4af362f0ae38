//! Population specifications
//!
//! A spec is either a leaf ("resolve this, go no further") or a map from
//! field name to a nested spec.

use std::collections::BTreeMap;

use crate::model::{ModelError, ModelResult};

/// Which references to resolve, and how deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateSpec {
    /// Populate this node. On a container, every populatable field one level down.
    Leaf,
    /// Populate only the named fields, each with its own spec.
    Fields(BTreeMap<String, PopulateSpec>),
}

impl Default for PopulateSpec {
    fn default() -> Self {
        PopulateSpec::Fields(BTreeMap::new())
    }
}

impl PopulateSpec {
    pub fn leaf() -> Self {
        PopulateSpec::Leaf
    }

    /// An empty field map, to be filled with `field` and `nest`
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` as a leaf
    pub fn field(self, name: impl Into<String>) -> Self {
        self.nest(name, PopulateSpec::Leaf)
    }

    /// Adds `name` with a nested spec, merging with any earlier entry
    pub fn nest(mut self, name: impl Into<String>, spec: PopulateSpec) -> Self {
        self.insert(name.into(), spec);
        self
    }

    /// A field map with every name as a leaf
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(Self::new(), |spec, name| spec.field(name))
    }

    /// Parses a dotted path: `"author.account"` populates `author`, then its `account`.
    pub fn path(path: &str) -> ModelResult<Self> {
        let mut segments = path.split('.').rev();
        let last = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| ModelError::InvalidPopulateSpec(format!("empty path '{}'", path)))?;

        let mut spec = Self::new().field(last);
        for segment in segments {
            if segment.is_empty() {
                return Err(ModelError::InvalidPopulateSpec(format!(
                    "empty segment in '{}'",
                    path
                )));
            }
            spec = Self::new().nest(segment, spec);
        }
        Ok(spec)
    }

    /// Builds a spec from its JSON form.
    ///
    /// - `true`: leaf
    /// - `"a.b"`: dotted path
    /// - `["a", "b.c"]`: union of the elements
    /// - `{"a": true, "b": {...}}`: per-field specs
    pub fn from_json(raw: &serde_json::Value) -> ModelResult<Self> {
        match raw {
            serde_json::Value::Bool(true) => Ok(PopulateSpec::Leaf),
            serde_json::Value::String(path) => Self::path(path),
            serde_json::Value::Array(items) => {
                let mut spec = Self::new();
                for item in items {
                    spec.merge(Self::from_json(item)?);
                }
                Ok(spec)
            }
            serde_json::Value::Object(map) => {
                let mut spec = Self::new();
                for (name, nested) in map {
                    spec.insert(name.clone(), Self::from_json(nested)?);
                }
                Ok(spec)
            }
            other => Err(ModelError::InvalidPopulateSpec(format!(
                "unsupported spec {}",
                other
            ))),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PopulateSpec::Leaf)
    }

    /// Nested spec for `name`, if requested
    pub fn get(&self, name: &str) -> Option<&PopulateSpec> {
        match self {
            PopulateSpec::Leaf => None,
            PopulateSpec::Fields(fields) => fields.get(name),
        }
    }

    fn insert(&mut self, name: String, spec: PopulateSpec) {
        match self {
            PopulateSpec::Leaf => {
                let mut fields = BTreeMap::new();
                fields.insert(name, spec);
                *self = PopulateSpec::Fields(fields);
            }
            PopulateSpec::Fields(fields) => match fields.get_mut(&name) {
                Some(existing) => existing.merge(spec),
                None => {
                    fields.insert(name, spec);
                }
            },
        }
    }

    /// Union of two specs. A field map is more specific than a leaf.
    pub fn merge(&mut self, other: PopulateSpec) {
        match other {
            PopulateSpec::Leaf => {}
            PopulateSpec::Fields(fields) => {
                for (name, spec) in fields {
                    self.insert(name, spec);
                }
            }
        }
    }
}
