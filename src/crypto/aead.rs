//! Seal/open primitives for evidence envelopes.
//!
//! # Algorithm
//!
//! ChaCha20-Poly1305: 256-bit key, 96-bit nonce, 128-bit tag. A fresh random
//! nonce is drawn from the OS CSPRNG on every seal; nonce reuse under one key
//! breaks confidentiality, so there is no caller-supplied nonce path at all.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::types::{CustodyError, Result};

use super::envelope::{EncryptedEnvelope, ENVELOPE_VERSION};

/// Symmetric key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Encrypt a payload under the given key, producing a self-describing
/// envelope that names `key_id` but never the key.
pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN], key_id: &str) -> Result<EncryptedEnvelope> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CustodyError::Internal(format!("Encryption failed: {e}")))?;

    // The cipher appends the tag; the envelope carries it as its own field
    let (ciphertext, auth_tag) = sealed.split_at(sealed.len() - AUTH_TAG_LEN);

    Ok(EncryptedEnvelope {
        version: ENVELOPE_VERSION,
        key_id: key_id.to_string(),
        nonce: BASE64.encode(nonce),
        auth_tag: BASE64.encode(auth_tag),
        ciphertext: BASE64.encode(ciphertext),
    })
}

/// Decrypt an envelope, verifying both the authentication tag and that the
/// envelope's key id matches the one the caller resolved from the ledger.
///
/// Any failure is an integrity error; no partial plaintext is ever returned.
pub fn open(
    envelope: &EncryptedEnvelope,
    key: &[u8; KEY_LEN],
    expected_key_id: &str,
) -> Result<Vec<u8>> {
    if envelope.key_id != expected_key_id {
        return Err(CustodyError::Integrity(format!(
            "Envelope key id '{}' does not match expected '{}'",
            envelope.key_id, expected_key_id
        )));
    }

    let nonce = envelope.nonce_bytes()?;
    let auth_tag = envelope.auth_tag_bytes()?;
    let ciphertext = envelope.ciphertext_bytes()?;

    if nonce.len() != NONCE_LEN {
        return Err(CustodyError::Integrity(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_LEN,
            nonce.len()
        )));
    }
    if auth_tag.len() != AUTH_TAG_LEN {
        return Err(CustodyError::Integrity(format!(
            "Invalid auth tag length: expected {}, got {}",
            AUTH_TAG_LEN,
            auth_tag.len()
        )));
    }

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&auth_tag);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
        .map_err(|_| {
            CustodyError::Integrity("Tag verification failed (tampered or wrong key)".to_string())
        })
}
