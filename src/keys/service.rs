//! Key service combining derivation and the cache.

use super::cache::{KeyCache, KeyCacheStats};
use super::derivation::{self, MasterKey, DERIVED_KEY_LEN};

/// Derives per-object keys on demand and caches them for process lifetime.
pub struct KeyService {
    master: MasterKey,
    cache: KeyCache,
}

impl KeyService {
    pub fn new(master: MasterKey) -> Self {
        Self {
            master,
            cache: KeyCache::new(),
        }
    }

    /// Return the key for `key_id`, deriving it on first use.
    pub fn derive(&self, key_id: &str) -> [u8; DERIVED_KEY_LEN] {
        if let Some(key) = self.cache.get(key_id) {
            return key;
        }
        let key = derivation::derive_key(&self.master, key_id);
        self.cache.insert(key_id, key);
        key
    }

    /// Generate a fresh key id (see [`derivation::generate_key_id`]).
    pub fn generate_key_id(&self) -> String {
        derivation::generate_key_id()
    }

    pub fn cache_stats(&self) -> KeyCacheStats {
        self.cache.stats()
    }
}
