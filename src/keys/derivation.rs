//! Keyed derivation of per-object symmetric keys.
//!
//! # Algorithm
//!
//! `key = HMAC-SHA256(master_secret, key_id)`. Deterministic per key id,
//! one-way, and independent across ids, which is what lets the ledger record
//! only a key id while the key itself stays derivable on demand.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::types::{CustodyError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Master secret length in bytes (decoded)
pub const MASTER_KEY_LEN: usize = 32;

/// Derived symmetric key length in bytes
pub const DERIVED_KEY_LEN: usize = 32;

/// Recognizable prefix on generated key ids
pub const KEY_ID_PREFIX: &str = "evk-";

/// Random bytes per generated key id (128 bits)
const KEY_ID_RAND_LEN: usize = 16;

/// Master secret for key derivation.
///
/// Decoded once at startup; zeroized on drop and opaque in Debug output.
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    /// Parse a master key from its 64-hex-char environment form.
    ///
    /// Absent or malformed input is a fatal configuration error, never a
    /// silent default.
    pub fn from_hex(encoded: Option<&str>) -> Result<Self> {
        let encoded = encoded.ok_or_else(|| {
            CustodyError::Configuration("Master key is not set".to_string())
        })?;

        let decoded = hex::decode(encoded.trim()).map_err(|e| {
            CustodyError::Configuration(format!("Master key is not valid hex: {e}"))
        })?;

        if decoded.len() != MASTER_KEY_LEN {
            return Err(CustodyError::Configuration(format!(
                "Master key must decode to {} bytes, got {}",
                MASTER_KEY_LEN,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; MASTER_KEY_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Derive the symmetric key for a key id.
///
/// Same master + same id always yields the same key.
pub fn derive_key(master: &MasterKey, key_id: &str) -> [u8; DERIVED_KEY_LEN] {
    let mut mac = HmacSha256::new_from_slice(master.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(key_id.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Generate a fresh, globally-unique key id.
///
/// 128 random bits from the OS CSPRNG, hex-formatted with a recognizable
/// prefix. Collision probability is cryptographically negligible.
pub fn generate_key_id() -> String {
    let mut bytes = [0u8; KEY_ID_RAND_LEN];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", KEY_ID_PREFIX, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master(byte: u8) -> MasterKey {
        MasterKey::from_hex(Some(&hex::encode([byte; MASTER_KEY_LEN]))).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let master = test_master(7);
        let k1 = derive_key(&master, "evk-abc");
        let k2 = derive_key(&master, "evk-abc");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_different_ids_different_keys() {
        let master = test_master(7);
        assert_ne!(derive_key(&master, "evk-abc"), derive_key(&master, "evk-abd"));
    }

    #[test]
    fn test_different_master_different_keys() {
        let a = test_master(7);
        let b = test_master(8);
        assert_ne!(derive_key(&a, "evk-abc"), derive_key(&b, "evk-abc"));
    }

    #[test]
    fn test_master_key_rejects_missing_and_malformed() {
        assert!(MasterKey::from_hex(None).is_err());
        assert!(MasterKey::from_hex(Some("zz")).is_err());
        // right charset, wrong length
        assert!(MasterKey::from_hex(Some("abcd")).is_err());
    }

    #[test]
    fn test_master_key_debug_is_opaque() {
        let master = test_master(9);
        assert_eq!(format!("{master:?}"), "MasterKey(..)");
    }

    #[test]
    fn test_key_id_shape_and_uniqueness() {
        let a = generate_key_id();
        let b = generate_key_id();
        assert!(a.starts_with(KEY_ID_PREFIX));
        assert_eq!(a.len(), KEY_ID_PREFIX.len() + KEY_ID_RAND_LEN * 2);
        assert_ne!(a, b);
    }
}
