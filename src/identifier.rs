//! Identifier generation
//!
//! The generator is injectable: fields and stores take an `IdGenerator`
//! and fall back to random UUIDs.

use std::sync::Arc;

use uuid::Uuid;

/// Produces a fresh identity value on every call.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Returns a random v4 UUID string.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// The default generator.
pub fn uuid_generator() -> IdGenerator {
    Arc::new(generate)
}

/// Generator yielding `<prefix>1`, `<prefix>2`, ... (handy for fixtures).
pub fn sequential(prefix: impl Into<String>) -> IdGenerator {
    use std::sync::atomic::{AtomicU64, Ordering};

    let prefix = prefix.into();
    let next = AtomicU64::new(1);
    Arc::new(move || format!("{}{}", prefix, next.fetch_add(1, Ordering::SeqCst)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate(), generate());
        assert_eq!(generate().len(), 36);
    }

    #[test]
    fn test_sequential_generator() {
        let gen = sequential("p");
        assert_eq!(gen(), "p1");
        assert_eq!(gen(), "p2");
    }
}
