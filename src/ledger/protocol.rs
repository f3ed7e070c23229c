//! Ledger frame protocol.
//!
//! Requests are MessagePack envelopes sent over the organization's channel:
//!
//! ```text
//! { type: "evaluate" | "propose" | "endorse" | "commit_status",
//!   payload: <MessagePack of the typed call>,
//!   identity: { msp_id, certificate, public_key },
//!   signature: <Ed25519 over the payload bytes> }
//! ```
//!
//! Responses come back as `{ type: "response", data: <MessagePack> }` or
//! `{ type: "error", data: { message } }`. Every frame is signed with the
//! tenant's own key, so a connection never submits under another tenant's
//! identity even when routing falls back.

use rmpv::Value;
use serde::{Deserialize, Serialize};

use crate::credentials::{OrgIdentity, OrgSigner};
use crate::types::{CustodyError, Result, TxPhase};

/// Ledger operation kind: read-only query vs. state-changing write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read-only; no distributed agreement, short deadline
    Evaluate,
    /// Read-write; staged through propose, endorse, and commit-status
    Submit,
}

/// Deployed contract a connection dispatches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractHandle {
    /// Ledger network (channel) the contract lives on
    pub network: String,
    /// Contract name
    pub contract: String,
}

/// Status string a committed transaction must report
pub const COMMIT_STATUS_VALID: &str = "VALID";

/// Read-only call payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateCall {
    pub network: String,
    pub contract: String,
    pub function: String,
    pub args: Vec<String>,
}

/// Proposal payload opening a Submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeCall {
    pub network: String,
    pub contract: String,
    pub function: String,
    pub args: Vec<String>,
    pub transaction_id: String,
}

/// Endorsement-collection payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndorseCall {
    pub transaction_id: String,
}

/// Commit-status payload closing a Submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStatusCall {
    pub transaction_id: String,
}

/// Response to an Evaluate frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResult {
    /// Contract return value, base64
    pub payload: String,
}

/// Response to a propose frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeResult {
    pub transaction_id: String,
    /// Simulated contract result, base64
    pub payload: String,
}

/// Response to an endorse frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndorseResult {
    pub transaction_id: String,
    /// How many parties endorsed
    pub endorsements: u32,
}

/// Response to a commit-status frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResult {
    pub transaction_id: String,
    /// Validation code; anything but "VALID" means the write was rejected
    pub status: String,
    /// Committed contract result, base64
    pub payload: String,
}

/// Builds signed request frames for one tenant connection.
pub struct FrameBuilder<'a> {
    contract: &'a ContractHandle,
    identity: &'a OrgIdentity,
    signer: &'a OrgSigner,
}

impl<'a> FrameBuilder<'a> {
    pub fn new(
        contract: &'a ContractHandle,
        identity: &'a OrgIdentity,
        signer: &'a OrgSigner,
    ) -> Self {
        Self {
            contract,
            identity,
            signer,
        }
    }

    /// Build an `evaluate` frame.
    pub fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>> {
        let call = EvaluateCall {
            network: self.contract.network.clone(),
            contract: self.contract.contract.clone(),
            function: function.to_string(),
            args: args.to_vec(),
        };
        self.build_frame(TxPhase::Evaluate, &call)
    }

    /// Build a `propose` frame opening transaction `transaction_id`.
    pub fn propose(
        &self,
        transaction_id: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let call = ProposeCall {
            network: self.contract.network.clone(),
            contract: self.contract.contract.clone(),
            function: function.to_string(),
            args: args.to_vec(),
            transaction_id: transaction_id.to_string(),
        };
        self.build_frame(TxPhase::Propose, &call)
    }

    /// Build an `endorse` frame.
    pub fn endorse(&self, transaction_id: &str) -> Result<Vec<u8>> {
        let call = EndorseCall {
            transaction_id: transaction_id.to_string(),
        };
        self.build_frame(TxPhase::Endorse, &call)
    }

    /// Build a `commit_status` frame.
    pub fn commit_status(&self, transaction_id: &str) -> Result<Vec<u8>> {
        let call = CommitStatusCall {
            transaction_id: transaction_id.to_string(),
        };
        self.build_frame(TxPhase::CommitStatus, &call)
    }

    /// Build a signed frame of the given phase around a typed payload.
    fn build_frame<T: Serialize>(&self, phase: TxPhase, payload: &T) -> Result<Vec<u8>> {
        let payload_bytes = rmp_serde::to_vec_named(payload)
            .map_err(|e| CustodyError::Internal(format!("Failed to serialize payload: {e}")))?;

        let signature = self.signer.sign(&payload_bytes);

        let identity = Value::Map(vec![
            (
                Value::String("msp_id".into()),
                Value::String(self.identity.msp_id.clone().into()),
            ),
            (
                Value::String("certificate".into()),
                Value::Binary(self.identity.certificate.clone()),
            ),
            (
                Value::String("public_key".into()),
                Value::Binary(self.signer.public_key_bytes().to_vec()),
            ),
        ]);

        let frame = Value::Map(vec![
            (
                Value::String("type".into()),
                Value::String(phase.as_str().into()),
            ),
            (Value::String("payload".into()), Value::Binary(payload_bytes)),
            (Value::String("identity".into()), identity),
            (
                Value::String("signature".into()),
                Value::Binary(signature.to_bytes().to_vec()),
            ),
        ]);

        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &frame)
            .map_err(|e| CustodyError::Internal(format!("Failed to encode frame: {e}")))?;

        Ok(buf)
    }
}

/// Parse a response frame into a typed result.
pub fn parse_response<T: for<'de> Deserialize<'de>>(response: &[u8]) -> Result<T> {
    let mut cursor = std::io::Cursor::new(response);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| CustodyError::Ledger(format!("Failed to decode response: {e}")))?;

    let Value::Map(ref map) = value else {
        return Err(CustodyError::Ledger("Response is not a frame".into()));
    };

    match get_field(map, "type") {
        Some(Value::String(type_str)) if type_str.as_str() == Some("error") => {
            let message = match get_field(map, "data") {
                Some(Value::Map(error_map)) => match get_field(error_map, "message") {
                    Some(Value::String(msg)) => msg.as_str().unwrap_or("Unknown error").to_string(),
                    _ => "Unknown error".to_string(),
                },
                _ => "Unknown error".to_string(),
            };
            Err(CustodyError::Ledger(message))
        }
        Some(Value::String(type_str)) if type_str.as_str() == Some("response") => {
            match get_field(map, "data") {
                Some(Value::Binary(data)) => rmp_serde::from_slice(data)
                    .map_err(|e| CustodyError::Ledger(format!("Failed to parse result: {e}"))),
                _ => Err(CustodyError::Ledger("Response frame has no data".into())),
            }
        }
        _ => Err(CustodyError::Ledger("Unexpected frame type".into())),
    }
}

/// Get a field from a MessagePack map
fn get_field<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    for (k, v) in map {
        if let Value::String(k_str) = k {
            if k_str.as_str() == Some(key) {
                return Some(v);
            }
        }
    }
    None
}

/// Decode a frame into its type and payload bytes (used by test doubles and
/// protocol-level tooling; the gateway itself only builds frames).
pub fn decode_frame(frame: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut cursor = std::io::Cursor::new(frame);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| CustodyError::Ledger(format!("Failed to decode frame: {e}")))?;

    let Value::Map(ref map) = value else {
        return Err(CustodyError::Ledger("Frame is not a map".into()));
    };

    let frame_type = match get_field(map, "type") {
        Some(Value::String(s)) => s.as_str().unwrap_or_default().to_string(),
        _ => return Err(CustodyError::Ledger("Frame has no type".into())),
    };

    let payload = match get_field(map, "payload") {
        Some(Value::Binary(data)) => data.clone(),
        _ => return Err(CustodyError::Ledger("Frame has no payload".into())),
    };

    Ok((frame_type, payload))
}

/// Encode a `{type: "response", data}` frame (used by test doubles).
pub fn encode_response<T: Serialize>(result: &T) -> Result<Vec<u8>> {
    let data = rmp_serde::to_vec_named(result)
        .map_err(|e| CustodyError::Internal(format!("Failed to serialize result: {e}")))?;

    let frame = Value::Map(vec![
        (
            Value::String("type".into()),
            Value::String("response".into()),
        ),
        (Value::String("data".into()), Value::Binary(data)),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &frame)
        .map_err(|e| CustodyError::Internal(format!("Failed to encode response: {e}")))?;
    Ok(buf)
}

/// Encode a `{type: "error", data: {message}}` frame (used by test doubles).
pub fn encode_error(message: &str) -> Result<Vec<u8>> {
    let frame = Value::Map(vec![
        (Value::String("type".into()), Value::String("error".into())),
        (
            Value::String("data".into()),
            Value::Map(vec![(
                Value::String("message".into()),
                Value::String(message.into()),
            )]),
        ),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &frame)
        .map_err(|e| CustodyError::Internal(format!("Failed to encode error: {e}")))?;
    Ok(buf)
}
