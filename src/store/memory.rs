//! In-process content store (for tests and development).
//!
//! Addresses objects by SHA-256 of their bytes, deduplicating identical
//! uploads the way the real backend does. Availability can be toggled so
//! callers' fail-fast paths are testable.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, DashSet};
use sha2::{Digest, Sha256};

use crate::types::{CustodyError, Result};

use super::{ContentRef, ContentStore};

/// Content store backed by an in-process map.
pub struct MemoryContentStore {
    objects: DashMap<String, Vec<u8>>,
    pins: DashSet<String>,
    available: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            pins: DashSet::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Compute the content address for a byte sequence.
    pub fn address_of(package: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(package);
        format!("sha256-{}", hex::encode(hasher.finalize()))
    }

    /// Toggle simulated backend availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_pinned(&self, content_id: &str) -> bool {
        self.pins.contains(content_id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CustodyError::BackendUnavailable(
                "Memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, package: &[u8]) -> Result<ContentRef> {
        self.check_available()?;

        let content_id = Self::address_of(package);
        self.objects
            .entry(content_id.clone())
            .or_insert_with(|| package.to_vec());
        self.pins.insert(content_id.clone());

        Ok(ContentRef {
            content_id,
            size: package.len() as u64,
        })
    }

    async fn get(&self, content_id: &str) -> Result<Vec<u8>> {
        self.check_available()?;

        self.objects
            .get(content_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| CustodyError::NotFound(content_id.to_string()))
    }

    async fn pin(&self, content_id: &str) -> Result<()> {
        self.check_available()?;
        if !self.objects.contains_key(content_id) {
            return Err(CustodyError::NotFound(content_id.to_string()));
        }
        self.pins.insert(content_id.to_string());
        Ok(())
    }

    async fn unpin(&self, content_id: &str) -> Result<()> {
        self.check_available()?;
        self.pins.remove(content_id);
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryContentStore::new();
        let package = b"sealed envelope bytes";

        let stored = store.put(package).await.unwrap();
        assert_eq!(stored.size, package.len() as u64);
        assert!(stored.content_id.starts_with("sha256-"));

        let fetched = store.get(&stored.content_id).await.unwrap();
        assert_eq!(fetched, package);
    }

    #[tokio::test]
    async fn test_identical_bytes_deduplicate() {
        let store = MemoryContentStore::new();
        let a = store.put(b"same bytes").await.unwrap();
        let b = store.put(b"same bytes").await.unwrap();
        assert_eq!(a.content_id, b.content_id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_address_is_not_found() {
        let store = MemoryContentStore::new();
        let err = store.get("sha256-missing").await.unwrap_err();
        assert!(matches!(err, CustodyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_distinguishable() {
        let store = MemoryContentStore::new();
        let stored = store.put(b"bytes").await.unwrap();

        store.set_available(false);
        assert!(!store.is_available().await);

        let err = store.get(&stored.content_id).await.unwrap_err();
        assert!(matches!(err, CustodyError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_pin_unpin() {
        let store = MemoryContentStore::new();
        let stored = store.put(b"pinned bytes").await.unwrap();
        assert!(store.is_pinned(&stored.content_id));

        store.unpin(&stored.content_id).await.unwrap();
        assert!(!store.is_pinned(&stored.content_id));

        store.pin(&stored.content_id).await.unwrap();
        assert!(store.is_pinned(&stored.content_id));

        let err = store.pin("sha256-absent").await.unwrap_err();
        assert!(matches!(err, CustodyError::NotFound(_)));
    }
}
