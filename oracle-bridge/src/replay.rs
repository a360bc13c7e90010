//! Replay guard: append-only set of consumed signed-message fingerprints

use std::collections::HashSet;

/// Consumed fingerprints. Entries are never removed.
#[derive(Debug, Default, Clone)]
pub struct ReplayGuard {
    consumed: HashSet<[u8; 32]>,
}

impl ReplayGuard {
    /// Empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the fingerprint was already consumed
    pub fn contains(&self, fingerprint: &[u8; 32]) -> bool {
        self.consumed.contains(fingerprint)
    }

    /// Record a fingerprint. Returns false if it was already present.
    pub fn consume(&mut self, fingerprint: [u8; 32]) -> bool {
        self.consumed.insert(fingerprint)
    }

    /// Number of consumed fingerprints
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    /// True if nothing was consumed yet
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}
