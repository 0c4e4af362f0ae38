//! Model types and their instances
//!
//! A model type is a named schema map plus hooks. Instances hold the
//! sanitized value tree and are shared by handle, so nested models and
//! resolved references keep their identity across reads.

mod array;
mod definition;
mod errors;
mod instance;
mod options;
mod value;

pub use array::ModelArray;
pub use definition::{AfterSetHook, BeforeSetHook, Model, ModelBuilder};
pub use errors::{ModelError, ModelResult};
pub use instance::Instance;
pub use options::{ModelOptions, PlainOptions, SanitizeOptions};
pub use value::{Reference, Value};

pub(crate) use value::{date_to_string, number_to_json};
