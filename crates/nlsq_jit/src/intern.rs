// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Interning of canonical signature strings.
//!
//! Two residuals that canonicalize to the same signature string collapse to
//! one arena handle, so the kernel cache keys on a cheap `Copy` id instead
//! of re-hashing and re-comparing the (potentially long) signature string on
//! every lookup once it has been seen before.

use id_arena::{Arena, Id};
use std::collections::HashMap;

/// Handle to an interned canonical signature.
pub type SignatureId = Id<String>;

/// Arena of canonical signature strings, deduplicated by content.
#[derive(Debug, Default)]
pub struct SignatureArena {
    arena: Arena<String>,
    by_text: HashMap<String, SignatureId>,
}

impl SignatureArena {
    /// Construct an empty arena.
    #[must_use]
    pub fn new() -> Self {
        SignatureArena {
            arena: Arena::new(),
            by_text: HashMap::new(),
        }
    }

    /// Intern `signature`, returning the existing handle if an identical
    /// string was interned before, or allocating a new one otherwise.
    pub fn intern(&mut self, signature: &str) -> SignatureId {
        if let Some(&id) = self.by_text.get(signature) {
            return id;
        }
        let id = self.arena.alloc(signature.to_string());
        self.by_text.insert(signature.to_string(), id);
        id
    }

    /// Number of distinct signatures interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no signature has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}

#[cfg(test)]
mod tests_intern {
    use super::*;

    #[test]
    fn identical_text_interns_to_the_same_id() {
        let mut arena = SignatureArena::new();
        let a = arena.intern("add(;[P:0,P:1])");
        let b = arena.intern("add(;[P:0,P:1])");
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn distinct_text_interns_to_distinct_ids() {
        let mut arena = SignatureArena::new();
        let a = arena.intern("add(;[P:0,P:1])");
        let b = arena.intern("mul(;[P:0,P:1])");
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
    }
}
