//! Per-object key derivation
//!
//! Evidence envelopes are encrypted under per-object keys derived from one
//! master secret, so no per-object key is ever stored at rest. A key id is
//! the sole namespacing axis: same id, same key, for the lifetime of a fixed
//! master secret.

pub mod cache;
pub mod derivation;
pub mod service;

pub use cache::{KeyCache, KeyCacheStats};
pub use derivation::{derive_key, generate_key_id, MasterKey, DERIVED_KEY_LEN, KEY_ID_PREFIX};
pub use service::KeyService;
