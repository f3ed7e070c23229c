//! Authenticated encryption for evidence payloads
//!
//! Evidence bytes are sealed into a self-describing envelope before they ever
//! reach the content store, so the store only sees opaque ciphertext. The
//! envelope carries a key id, never key material.

pub mod aead;
pub mod digest;
pub mod envelope;

pub use aead::{open, seal, AUTH_TAG_LEN, KEY_LEN, NONCE_LEN};
pub use digest::{compute_digest, verify_digest};
pub use envelope::{EncryptedEnvelope, ENVELOPE_VERSION};
