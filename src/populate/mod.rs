//! Population of reference fields
//!
//! Turns identifiers stored in reference fields into instances fetched from
//! the field's collection, following a recursive `PopulateSpec`.
//!
//! # Rules
//!
//! - An already resolved reference keeps its instance
//! - A missing identifier fails the whole call with "Id `<id>` not found"
//! - Reference arrays are fetched with a single `find_by_ids` call
//! - Nothing is committed unless every requested branch succeeded
//! - Naming a field the schema lacks fails with "Key `<name>` not found in schema."

mod resolver;
mod spec;

pub use spec::PopulateSpec;

pub(crate) use resolver::populate_instance;
