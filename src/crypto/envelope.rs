//! Encrypted envelope wire format.
//!
//! The envelope is the exact document stored on the content-addressed
//! backend: `{version, keyId, nonce, authTag, ciphertext}` with base64 binary
//! fields. It must round-trip byte-exactly across implementations, so field
//! names are fixed and the version is checked on decode. Unknown versions
//! are rejected, never guessed at.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::types::{CustodyError, Result};

/// Current envelope format version
pub const ENVELOPE_VERSION: u32 = 1;

/// Versioned, immutable envelope around one encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Format version; decoders reject versions they don't know
    pub version: u32,
    /// Key id referencing derivable key material (never the key itself)
    pub key_id: String,
    /// AEAD nonce, base64
    pub nonce: String,
    /// AEAD authentication tag, base64
    pub auth_tag: String,
    /// Ciphertext without the tag, base64
    pub ciphertext: String,
}

impl EncryptedEnvelope {
    /// Serialize to the canonical JSON document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CustodyError::Internal(format!("Failed to encode envelope: {e}")))
    }

    /// Parse an envelope document, rejecting unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Self = serde_json::from_slice(bytes)
            .map_err(|e| CustodyError::Integrity(format!("Malformed envelope: {e}")))?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(CustodyError::Integrity(format!(
                "Unsupported envelope version {}",
                envelope.version
            )));
        }

        Ok(envelope)
    }

    pub(crate) fn nonce_bytes(&self) -> Result<Vec<u8>> {
        decode_field(&self.nonce, "nonce")
    }

    pub(crate) fn auth_tag_bytes(&self) -> Result<Vec<u8>> {
        decode_field(&self.auth_tag, "authTag")
    }

    pub(crate) fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        decode_field(&self.ciphertext, "ciphertext")
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| CustodyError::Integrity(format!("Invalid base64 in {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedEnvelope {
        EncryptedEnvelope {
            version: ENVELOPE_VERSION,
            key_id: "evk-00112233445566778899aabbccddeeff".to_string(),
            nonce: BASE64.encode([0u8; 12]),
            auth_tag: BASE64.encode([1u8; 16]),
            ciphertext: BASE64.encode(b"opaque"),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        let obj = json.as_object().unwrap();
        for field in ["version", "keyId", "nonce", "authTag", "ciphertext"] {
            assert!(obj.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(obj.len(), 5);
    }

    #[test]
    fn test_round_trip() {
        let envelope = sample();
        let bytes = envelope.to_bytes().unwrap();
        let decoded = EncryptedEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.key_id, envelope.key_id);
        assert_eq!(decoded.nonce, envelope.nonce);
        assert_eq!(decoded.auth_tag, envelope.auth_tag);
        assert_eq!(decoded.ciphertext, envelope.ciphertext);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut envelope = sample();
        envelope.version = 2;
        let bytes = envelope.to_bytes().unwrap();

        let err = EncryptedEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CustodyError::Integrity(_)));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_garbage_document_rejected() {
        let err = EncryptedEnvelope::from_bytes(b"not json at all").unwrap_err();
        assert!(matches!(err, CustodyError::Integrity(_)));
    }
}
