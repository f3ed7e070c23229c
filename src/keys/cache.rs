//! In-memory cache for derived keys.
//!
//! The cache is a pure optimization: every key is re-derivable from the
//! master secret, so entries never need eviction or persistence. Inserts are
//! idempotent; a concurrent duplicate derivation for the same key id is
//! harmless.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::derivation::DERIVED_KEY_LEN;

/// Snapshot of cache counters.
#[derive(Debug, Clone)]
pub struct KeyCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Append-only map from key id to derived key.
pub struct KeyCache {
    entries: DashMap<String, [u8; DERIVED_KEY_LEN]>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a derived key.
    pub fn get(&self, key_id: &str) -> Option<[u8; DERIVED_KEY_LEN]> {
        match self.entries.get(key_id) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a derived key, keeping any value already present.
    ///
    /// Losing a racing insert only means the same bytes were computed twice.
    pub fn insert(&self, key_id: &str, key: [u8; DERIVED_KEY_LEN]) {
        self.entries.entry(key_id.to_string()).or_insert(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> KeyCacheStats {
        KeyCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
