//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of the modeling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Definitions
    /// A model type was built
    ModelDefined,

    // Instance lifecycle
    /// Raw input was rejected by sanitization
    SanitizeRejected,
    /// An instance failed validation
    ValidationFailed,

    // Population
    /// A reference fetch was issued against a collection
    PopulateFetch,
    /// A referenced identifier was missing from its collection
    PopulateMiss,

    // Collections
    /// An instance was stored
    CollectionInsert,
    /// An insert collided with an existing identity value
    CollectionDuplicate,
    /// An instance was removed
    CollectionDelete,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ModelDefined => "MODEL_DEFINED",
            Event::SanitizeRejected => "SANITIZE_REJECTED",
            Event::ValidationFailed => "VALIDATION_FAILED",
            Event::PopulateFetch => "POPULATE_FETCH",
            Event::PopulateMiss => "POPULATE_MISS",
            Event::CollectionInsert => "COLLECTION_INSERT",
            Event::CollectionDuplicate => "COLLECTION_DUPLICATE",
            Event::CollectionDelete => "COLLECTION_DELETE",
        }
    }

    /// Whether the event reports a rejected operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::SanitizeRejected
                | Event::ValidationFailed
                | Event::PopulateMiss
                | Event::CollectionDuplicate
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_strings() {
        assert_eq!(Event::ModelDefined.as_str(), "MODEL_DEFINED");
        assert_eq!(Event::PopulateMiss.as_str(), "POPULATE_MISS");
        assert_eq!(Event::CollectionDuplicate.to_string(), "COLLECTION_DUPLICATE");
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::ValidationFailed.is_failure());
        assert!(Event::CollectionDuplicate.is_failure());
        assert!(!Event::CollectionInsert.is_failure());
        assert!(!Event::PopulateFetch.is_failure());
    }
}
