//! Credential loading from the per-organization directory tree.
//!
//! Layout, per organization, under a fixed root:
//!
//! ```text
//! {root}/{org}/ca.crt          TLS root certificate
//! {root}/{org}/cert.pem        user certificate
//! {root}/{org}/keystore/*_sk   exactly one private-key file (hex Ed25519 seed)
//! ```
//!
//! Failures are specific (`UnknownOrganization`, `MissingCertificate`,
//! `MissingKey`) so a misconfigured tenant is diagnosable from the log line
//! alone. Private key material is never logged.

use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Signer, SigningKey};
use tokio::fs;
use tracing::debug;

use crate::types::{CustodyError, Result};

/// TLS root certificate file name
const TLS_ROOT_FILE: &str = "ca.crt";

/// User certificate file name
const USER_CERT_FILE: &str = "cert.pem";

/// Key directory name
const KEYSTORE_DIR: &str = "keystore";

/// Private-key file suffix convention
const KEY_SUFFIX: &str = "_sk";

/// An organization's identity: who it is on the ledger.
#[derive(Debug, Clone)]
pub struct OrgIdentity {
    /// Organization name
    pub org: String,
    /// Membership service provider ID
    pub msp_id: String,
    /// User certificate bytes (presented to the ledger)
    pub certificate: Vec<u8>,
    /// TLS root certificate bytes (trust anchor for the channel)
    pub tls_root: Vec<u8>,
}

/// An organization's signing capability.
///
/// Wraps the private key; the key bytes themselves stay inside and never
/// appear in Debug output or logs.
pub struct OrgSigner {
    org: String,
    key: SigningKey,
}

impl OrgSigner {
    /// Build a signer from a raw 32-byte seed (ephemeral/dev identities).
    pub fn from_seed(org: &str, seed: [u8; 32]) -> Self {
        Self {
            org: org.to_string(),
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Sign a payload on behalf of this organization.
    pub fn sign(&self, payload: &[u8]) -> Signature {
        self.key.sign(payload)
    }

    /// Public half of the signing key, for verification by the ledger.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn org(&self) -> &str {
        &self.org
    }
}

impl std::fmt::Debug for OrgSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgSigner")
            .field("org", &self.org)
            .finish_non_exhaustive()
    }
}

/// Loads identities and signers from the credential directory tree.
pub struct CredentialLoader {
    root: PathBuf,
}

impl CredentialLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn org_dir(&self, org: &str) -> PathBuf {
        self.root.join(org)
    }

    /// Load an organization's identity (certificates).
    pub async fn load_identity(&self, org: &str, msp_id: &str) -> Result<OrgIdentity> {
        let dir = self.org_dir(org);
        if fs::metadata(&dir).await.is_err() {
            return Err(CustodyError::UnknownOrganization(format!(
                "No credential directory for '{org}' under {}",
                self.root.display()
            )));
        }

        let certificate = read_cert(&dir.join(USER_CERT_FILE), org).await?;
        let tls_root = read_cert(&dir.join(TLS_ROOT_FILE), org).await?;

        debug!(org = %org, msp_id = %msp_id, "Loaded identity");

        Ok(OrgIdentity {
            org: org.to_string(),
            msp_id: msp_id.to_string(),
            certificate,
            tls_root,
        })
    }

    /// Load an organization's signer from its keystore.
    ///
    /// The keystore must contain exactly one `*_sk` file; zero or multiple
    /// matches is a fatal credential error for that organization.
    pub async fn load_signer(&self, org: &str) -> Result<OrgSigner> {
        let dir = self.org_dir(org);
        if fs::metadata(&dir).await.is_err() {
            return Err(CustodyError::UnknownOrganization(format!(
                "No credential directory for '{org}' under {}",
                self.root.display()
            )));
        }

        let keystore = dir.join(KEYSTORE_DIR);
        let mut entries = fs::read_dir(&keystore).await.map_err(|_| {
            CustodyError::MissingKey(format!("{org}: keystore directory is missing"))
        })?;

        let mut key_files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(KEY_SUFFIX) {
                key_files.push(entry.path());
            }
        }

        let key_path = match key_files.len() {
            1 => key_files.remove(0),
            0 => {
                return Err(CustodyError::MissingKey(format!(
                    "{org}: no {KEY_SUFFIX} file in keystore"
                )))
            }
            n => {
                return Err(CustodyError::MissingKey(format!(
                    "{org}: expected exactly one {KEY_SUFFIX} file in keystore, found {n}"
                )))
            }
        };

        let encoded = fs::read_to_string(&key_path).await.map_err(|e| {
            CustodyError::MissingKey(format!("{org}: key file is unreadable: {e}"))
        })?;

        let decoded = hex::decode(encoded.trim()).map_err(|_| {
            CustodyError::Credential(format!("{org}: key file is not valid hex"))
        })?;

        let seed: [u8; 32] = decoded.try_into().map_err(|_| {
            CustodyError::Credential(format!("{org}: key file must decode to 32 bytes"))
        })?;

        debug!(org = %org, "Loaded signer");

        Ok(OrgSigner::from_seed(org, seed))
    }
}

async fn read_cert(path: &Path, org: &str) -> Result<Vec<u8>> {
    fs::read(path).await.map_err(|_| {
        CustodyError::MissingCertificate(format!(
            "{org}: cannot read {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ))
    })
}
