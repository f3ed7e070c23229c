//! Custody pipeline orchestrator
//!
//! Composes key derivation, the envelope codec, the content store, and the
//! connection registry into the register/retrieve/verify flows. Every
//! registration encrypts-and-stores before it commits a ledger transaction;
//! every download resolves the ledger-recorded key id before decrypting.
//!
//! Lower-level failures are mapped into the gateway taxonomy here; transport
//! error types never leak to the route layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto::{self, EncryptedEnvelope};
use crate::keys::KeyService;
use crate::ledger::{ConnectionRegistry, Operation};
use crate::store::ContentStore;
use crate::types::{CustodyError, Result};

/// Contract function recording a new piece of evidence
const FN_REGISTER: &str = "registerEvidence";

/// Contract function reading an evidence record
const FN_GET: &str = "getEvidence";

/// Evidence record as the contract returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub evidence_id: String,
    pub case_id: String,
    /// Content address of the sealed envelope, not of the plaintext
    pub content_id: String,
    /// Key id whose derived key opens the envelope
    pub key_id: String,
    /// SHA-256 of the plaintext, committed at acquisition time
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Result of registering evidence.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub evidence_id: String,
    pub content_id: String,
    pub digest: String,
}

/// The register/retrieve/verify surface consumed by the route layer.
pub struct CustodyPipeline {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn ContentStore>,
    keys: Arc<KeyService>,
}

impl CustodyPipeline {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn ContentStore>,
        keys: Arc<KeyService>,
    ) -> Self {
        Self {
            registry,
            store,
            keys,
        }
    }

    /// Register evidence: digest, seal, store, then commit to the ledger
    /// under the caller's organization.
    pub async fn register(
        &self,
        plaintext: &[u8],
        case_id: &str,
        org_hint: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<RegisterOutcome> {
        if !self.store.is_available().await {
            return Err(CustodyError::BackendUnavailable(
                "Content store is not reachable; refusing evidence upload".to_string(),
            ));
        }

        let digest = crypto::compute_digest(plaintext);
        let key_id = self.keys.generate_key_id();
        let key = self.keys.derive(&key_id);

        let envelope = crypto::seal(plaintext, &key, &key_id)?;
        let package = envelope.to_bytes()?;
        let stored = self.store.put(&package).await?;

        let evidence_id = format!("ev-{}", Uuid::new_v4());
        let metadata_json = metadata.unwrap_or_else(|| serde_json::json!({}));
        let args = vec![
            evidence_id.clone(),
            case_id.to_string(),
            stored.content_id.clone(),
            digest.clone(),
            key_id,
            metadata_json.to_string(),
        ];

        self.registry
            .dispatch(org_hint, Operation::Submit, FN_REGISTER, &args)
            .await?;

        info!(
            evidence_id = %evidence_id,
            case_id = %case_id,
            content_id = %stored.content_id,
            size = stored.size,
            "Evidence registered"
        );

        Ok(RegisterOutcome {
            evidence_id,
            content_id: stored.content_id,
            digest,
        })
    }

    /// Retrieve evidence plaintext by id.
    ///
    /// Decryption failure surfaces as an integrity error naming the evidence
    /// id ("tampered or key mismatch"), never a generic internal error.
    pub async fn retrieve(&self, evidence_id: &str, org_hint: Option<&str>) -> Result<Vec<u8>> {
        let record = self.fetch_record(evidence_id, org_hint).await?;

        let package = self.store.get(&record.content_id).await?;
        let envelope = EncryptedEnvelope::from_bytes(&package)?;
        let key = self.keys.derive(&record.key_id);

        crypto::open(&envelope, &key, &record.key_id).map_err(|_| {
            warn!(
                evidence_id = %evidence_id,
                content_id = %record.content_id,
                "Evidence decryption failed"
            );
            CustodyError::Integrity(format!(
                "Evidence {evidence_id} is tampered or its key does not match"
            ))
        })
    }

    /// Check a supplied digest against the ledger-recorded one.
    pub async fn verify_digest(
        &self,
        evidence_id: &str,
        supplied: &str,
        org_hint: Option<&str>,
    ) -> Result<bool> {
        let record = self.fetch_record(evidence_id, org_hint).await?;
        Ok(record.digest.eq_ignore_ascii_case(supplied.trim()))
    }

    async fn fetch_record(
        &self,
        evidence_id: &str,
        org_hint: Option<&str>,
    ) -> Result<EvidenceRecord> {
        let payload = self
            .registry
            .dispatch(
                org_hint,
                Operation::Evaluate,
                FN_GET,
                &[evidence_id.to_string()],
            )
            .await?;

        // The contract answers an unknown id with an empty payload
        if payload.is_empty() {
            return Err(CustodyError::NotFound(format!(
                "No evidence record for '{evidence_id}'"
            )));
        }

        serde_json::from_slice(&payload)
            .map_err(|e| CustodyError::Ledger(format!("Malformed evidence record: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_field_names() {
        let record = EvidenceRecord {
            evidence_id: "ev-1".to_string(),
            case_id: "CASE-1".to_string(),
            content_id: "sha256-abc".to_string(),
            key_id: "evk-0011".to_string(),
            digest: "deadbeef".to_string(),
            metadata: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        for field in ["evidenceId", "caseId", "contentId", "keyId", "digest"] {
            assert!(obj.contains_key(field), "missing wire field {field}");
        }
        assert!(!obj.contains_key("metadata"));
    }

    #[test]
    fn test_record_round_trip_with_metadata() {
        let json = serde_json::json!({
            "evidenceId": "ev-2",
            "caseId": "CASE-9",
            "contentId": "sha256-def",
            "keyId": "evk-2233",
            "digest": "cafe",
            "metadata": {"device": "laptop-3"}
        });

        let record: EvidenceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.case_id, "CASE-9");
        assert_eq!(record.metadata.unwrap()["device"], "laptop-3");
    }
}
