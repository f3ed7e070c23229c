//! Content-addressed package storage
//!
//! The backend is untrusted: it only ever sees sealed envelope bytes and
//! addresses them by content. Uploads are at-least-once from the caller's
//! side; identical bytes deduplicate to the same address, so retries are
//! idempotent at the storage layer.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::types::Result;

pub use http::HttpContentStore;
pub use memory::MemoryContentStore;

/// Address and size of a stored package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    /// Content-derived address of the package bytes
    pub content_id: String,
    /// Package size in bytes
    pub size: u64,
}

/// Adapter over a content-addressed backend.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload package bytes, returning their content address.
    async fn put(&self, package: &[u8]) -> Result<ContentRef>;

    /// Fetch package bytes by content address.
    ///
    /// `NotFound` when the backend has no object for the address (often
    /// permanent); `BackendUnavailable` when the store cannot be reached
    /// (retryable). Callers must be able to tell the two apart.
    async fn get(&self, content_id: &str) -> Result<Vec<u8>>;

    /// Pin an object so the backend keeps it.
    async fn pin(&self, content_id: &str) -> Result<()>;

    /// Release a pin.
    async fn unpin(&self, content_id: &str) -> Result<()>;

    /// Whether the backend currently answers at all. Upload paths check this
    /// first and fail fast instead of hanging on a dead backend.
    async fn is_available(&self) -> bool;
}
