//! ID generation utilities.

use std::sync::{Mutex, PoisonError};
use ulid::{Generator, Ulid};

/// Generator for record push keys and tokens.
///
/// Push keys are the generated-key allocation primitive of the record store:
/// every chat and message identifier comes from [`IdGenerator::generate`].
#[derive(Default)]
pub struct IdGenerator {
    generator: Mutex<Generator>,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generator: Mutex::new(Generator::new()),
        }
    }

    /// Generate a new ULID-based push key.
    ///
    /// ULIDs are:
    /// - Globally unique
    /// - Lexicographically sortable, roughly time-ordered
    /// - Monotonically increasing within the same millisecond (per generator)
    ///
    /// The ordering property is load-bearing: message ids extend the
    /// `createdAt` order, so ties between equal timestamps resolve to
    /// generation order.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        generator
            .generate()
            // The monotonic counter can overflow within one millisecond; a
            // fresh random ULID is still unique and time-prefixed.
            .unwrap_or_else(|_| Ulid::new())
            .to_string()
            .to_lowercase()
    }

    /// Generate a random opaque token (no time component).
    #[must_use]
    pub fn generate_token(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

impl Clone for IdGenerator {
    fn clone(&self) -> Self {
        Self::new()
    }
}
