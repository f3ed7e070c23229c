//! One tenant's authenticated ledger connection.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::credentials::{OrgIdentity, OrgSigner};

use super::channel::LedgerChannel;
use super::protocol::ContractHandle;

/// Everything one organization needs to transact: identity, signer, a live
/// channel, and the resolved contract handle.
///
/// Never partially constructed: the registry only builds one of these after
/// identity, signer, and channel setup have all succeeded. Owned exclusively
/// by the registry; dropping the last reference releases the channel.
pub struct TenantConnection {
    /// Organization name
    pub org: String,
    /// Membership identity presented on every frame
    pub identity: OrgIdentity,
    /// Private-key-backed signing capability
    pub signer: OrgSigner,
    /// Live channel to this organization's ledger endpoint
    pub channel: Arc<dyn LedgerChannel>,
    /// Deployed contract this connection dispatches against
    pub contract: ContractHandle,
    /// When this connection reached Ready
    pub connected_at: DateTime<Utc>,
}

impl TenantConnection {
    pub fn new(
        identity: OrgIdentity,
        signer: OrgSigner,
        channel: Arc<dyn LedgerChannel>,
        contract: ContractHandle,
    ) -> Self {
        Self {
            org: identity.org.clone(),
            identity,
            signer,
            channel,
            contract,
            connected_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("org", &self.org)
            .field("msp_id", &self.identity.msp_id)
            .field("contract", &self.contract)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}
