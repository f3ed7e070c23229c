//! Shared fixtures: a loopback ledger speaking the gateway's frame protocol
//! over an in-memory evidence map, plus credential-directory builders.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;

use custody_gateway::config::OrgConfig;
use custody_gateway::ledger::protocol::{
    self, CommitResult, CommitStatusCall, ContractHandle, EndorseCall, EndorseResult,
    EvaluateCall, EvaluateResult, ProposeCall, ProposeResult,
};
use custody_gateway::ledger::{LedgerChannel, LedgerConnector};
use custody_gateway::types::{CustodyError, Result};

/// Shared ledger world: committed records plus in-flight proposals.
#[derive(Default)]
pub struct LoopbackState {
    pub records: DashMap<String, serde_json::Value>,
    pub pending: DashMap<String, (String, Vec<String>)>,
}

/// Ledger endpoint test double. Handles the full frame protocol in-process,
/// with optional per-phase delays for deadline tests.
pub struct LoopbackChannel {
    state: Arc<LoopbackState>,
    endorse_delay: Duration,
    commit_delay: Duration,
}

#[async_trait]
impl LedgerChannel for LoopbackChannel {
    async fn request(&self, frame: Vec<u8>) -> Result<Vec<u8>> {
        let (frame_type, payload) = protocol::decode_frame(&frame)?;

        match frame_type.as_str() {
            "evaluate" => {
                let call: EvaluateCall = decode(&payload)?;
                if call.function != "getEvidence" {
                    return protocol::encode_error(&format!(
                        "unknown function {}",
                        call.function
                    ));
                }
                let id = call.args.first().cloned().unwrap_or_default();
                let payload = match self.state.records.get(&id) {
                    Some(record) => BASE64.encode(record.to_string()),
                    None => String::new(),
                };
                protocol::encode_response(&EvaluateResult { payload })
            }
            "propose" => {
                let call: ProposeCall = decode(&payload)?;
                self.state.pending.insert(
                    call.transaction_id.clone(),
                    (call.function.clone(), call.args.clone()),
                );
                protocol::encode_response(&ProposeResult {
                    transaction_id: call.transaction_id,
                    payload: String::new(),
                })
            }
            "endorse" => {
                tokio::time::sleep(self.endorse_delay).await;
                let call: EndorseCall = decode(&payload)?;
                protocol::encode_response(&EndorseResult {
                    transaction_id: call.transaction_id,
                    endorsements: 2,
                })
            }
            "commit_status" => {
                tokio::time::sleep(self.commit_delay).await;
                let call: CommitStatusCall = decode(&payload)?;

                if let Some((_, (function, args))) =
                    self.state.pending.remove(&call.transaction_id)
                {
                    if function == "registerEvidence" {
                        let metadata: serde_json::Value = args
                            .get(5)
                            .and_then(|raw| serde_json::from_str(raw).ok())
                            .unwrap_or_else(|| serde_json::json!({}));
                        let record = serde_json::json!({
                            "evidenceId": args[0],
                            "caseId": args[1],
                            "contentId": args[2],
                            "digest": args[3],
                            "keyId": args[4],
                            "metadata": metadata,
                        });
                        self.state.records.insert(args[0].clone(), record);
                    }
                }

                protocol::encode_response(&CommitResult {
                    transaction_id: call.transaction_id,
                    status: "VALID".to_string(),
                    payload: String::new(),
                })
            }
            other => protocol::encode_error(&format!("unknown frame type {other}")),
        }
    }

    async fn is_connected(&self) -> bool {
        true
    }
}

/// Connector handing out loopback channels that share one ledger world.
pub struct LoopbackConnector {
    pub state: Arc<LoopbackState>,
    pub endorse_delay: Duration,
    pub commit_delay: Duration,
}

impl LoopbackConnector {
    pub fn new(state: Arc<LoopbackState>) -> Self {
        Self {
            state,
            endorse_delay: Duration::ZERO,
            commit_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl LedgerConnector for LoopbackConnector {
    async fn connect(&self, _org: &str, _url: &str) -> Result<Arc<dyn LedgerChannel>> {
        Ok(Arc::new(LoopbackChannel {
            state: Arc::clone(&self.state),
            endorse_delay: self.endorse_delay,
            commit_delay: self.commit_delay,
        }))
    }
}

fn decode<T: for<'de> serde::Deserialize<'de>>(payload: &[u8]) -> Result<T> {
    rmp_serde::from_slice(payload)
        .map_err(|e| CustodyError::Ledger(format!("loopback decode failed: {e}")))
}

/// Lay down one organization's credential tree under `root`.
pub async fn write_org_credentials(root: &Path, org: &str, seed: u8) {
    let dir = root.join(org);
    tokio::fs::create_dir_all(dir.join("keystore")).await.unwrap();
    tokio::fs::write(
        dir.join("ca.crt"),
        format!("-----BEGIN CERTIFICATE-----\n{org}-root\n"),
    )
    .await
    .unwrap();
    tokio::fs::write(
        dir.join("cert.pem"),
        format!("-----BEGIN CERTIFICATE-----\n{org}-user\n"),
    )
    .await
    .unwrap();
    tokio::fs::write(
        dir.join("keystore").join(format!("{org}_sk")),
        hex::encode([seed; 32]),
    )
    .await
    .unwrap();
}

/// Standard two-org configuration used across tests.
pub fn two_org_configs() -> Vec<OrgConfig> {
    vec![
        OrgConfig {
            name: "org1".to_string(),
            msp_id: "Org1MSP".to_string(),
            ledger_url: "ws://localhost:7051".to_string(),
        },
        OrgConfig {
            name: "org2".to_string(),
            msp_id: "Org2MSP".to_string(),
            ledger_url: "ws://localhost:9051".to_string(),
        },
    ]
}

pub fn evidence_contract() -> ContractHandle {
    ContractHandle {
        network: "custodychannel".to_string(),
        contract: "evidence".to_string(),
    }
}
