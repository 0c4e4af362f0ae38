//! Option sets for sanitize, set and plain conversion

use serde::{Deserialize, Serialize};

/// Controls how raw input is turned into stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeOptions {
    /// Synthesize defaults for absent required fields.
    pub apply_defaults: bool,
    /// Clear every field first, so fields absent from the input end up unset.
    pub replace: bool,
}

impl SanitizeOptions {
    /// Options used when creating a new instance.
    pub fn create() -> Self {
        Self {
            apply_defaults: true,
            replace: false,
        }
    }

    /// Partial update: omitted fields keep their stored value.
    pub fn update() -> Self {
        Self::default()
    }

    /// Full overwrite with defaults for whatever the input leaves out.
    pub fn replace() -> Self {
        Self {
            apply_defaults: true,
            replace: true,
        }
    }
}

/// Controls conversion to the plain transport form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainOptions {
    /// Collapse resolved references back to their identifier.
    pub unpopulate: bool,
}

impl PlainOptions {
    /// Resolved references stay expanded (the default).
    pub fn populated() -> Self {
        Self { unpopulate: false }
    }

    /// Resolved references collapse to bare identifiers.
    pub fn unpopulated() -> Self {
        Self { unpopulate: true }
    }
}

/// Per-model settings fixed at definition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Reject raw keys that are not declared in the schema.
    pub strict: bool,
    /// Field holding the identity value.
    pub id_field: String,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            strict: true,
            id_field: "id".to_string(),
        }
    }
}
