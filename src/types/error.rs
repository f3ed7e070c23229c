//! Error types for the custody gateway
//!
//! One taxonomy for the whole pipeline. Startup-time problems are
//! `Configuration`; per-organization credential problems carry enough detail
//! to diagnose a misconfigured tenant without reading a stack trace.

use std::fmt;

/// Phase of a ledger transaction that can exceed its deadline.
///
/// Retry safety differs per phase: an `Evaluate` or `Propose` timeout is safe
/// to resubmit, while a timeout after endorsement may duplicate effects. The
/// caller decides; the gateway never retries automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Evaluate,
    Propose,
    Endorse,
    CommitStatus,
}

impl TxPhase {
    /// Wire/display name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Propose => "propose",
            Self::Endorse => "endorse",
            Self::CommitStatus => "commit_status",
        }
    }
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for custody gateway operations
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// Fatal startup-time misconfiguration (missing master key, no orgs, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No credential directory for the named organization
    #[error("Unknown organization: {0}")]
    UnknownOrganization(String),

    /// A required certificate file is absent or unreadable
    #[error("Missing certificate: {0}")]
    MissingCertificate(String),

    /// The keystore does not contain exactly one private key
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// Other per-organization credential failure (bad encoding, wrong length)
    #[error("Credential error: {0}")]
    Credential(String),

    /// The content store cannot be reached; retryable
    #[error("Content store unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend has no object for this address; terminal for the request
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tampering, truncation, or key mismatch; never downgraded
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A dispatch phase exceeded its deadline; caller decides whether to retry
    #[error("Transaction deadline exceeded in {phase} phase")]
    TransactionTimeout { phase: TxPhase },

    /// Registry has no usable connection (not initialized or shut down)
    #[error("Gateway not initialized: {0}")]
    GatewayNotInitialized(String),

    /// Ledger transport failure (connect, frame encode/decode, remote error)
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CustodyError {
    /// Whether the caller may usefully retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for CustodyError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for CustodyError {
    fn from(err: reqwest::Error) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CustodyError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ledger(err.to_string())
    }
}

/// Result type alias for custody gateway operations
pub type Result<T> = std::result::Result<T, CustodyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_names_phase() {
        let err = CustodyError::TransactionTimeout {
            phase: TxPhase::Endorse,
        };
        assert_eq!(
            err.to_string(),
            "Transaction deadline exceeded in endorse phase"
        );

        let err = CustodyError::TransactionTimeout {
            phase: TxPhase::CommitStatus,
        };
        assert!(err.to_string().contains("commit_status"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CustodyError::BackendUnavailable("down".into()).is_retryable());
        assert!(!CustodyError::NotFound("gone".into()).is_retryable());
        assert!(!CustodyError::Integrity("tag".into()).is_retryable());
    }
}
