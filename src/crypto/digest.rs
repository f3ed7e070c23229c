//! Content digests for evidence integrity.
//!
//! This is a separate trust boundary from the envelope's AEAD tag: the digest
//! is computed over the plaintext at acquisition time and committed to the
//! ledger, proving the bytes equal what was hashed at intake.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `bytes` as lowercase hex.
pub fn compute_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Check `bytes` against a hex digest committed earlier. Case-insensitive.
pub fn verify_digest(bytes: &[u8], expected: &str) -> bool {
    compute_digest(bytes).eq_ignore_ascii_case(expected.trim())
}
