//! Connection registry: per-organization lifecycle, resolution, dispatch.
//!
//! ## Lifecycle
//!
//! Per organization: Uninitialized → Connecting → Ready, or → Failed. A
//! failed organization is logged and omitted; only the all-failed case is
//! fatal. Initialization and shutdown are exclusive phases; between them the
//! connection map is read-mostly and safe for concurrent lookups.
//!
//! ## Resolution
//!
//! Two explicit steps: hint → organization name (MSP lookup table, or a
//! literal registered name), then name → connection with fallback to the
//! configured default organization. The fallback trades tenant isolation for
//! availability and is logged loudly, because it redirects a request onto a
//! different tenant's identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrgConfig;
use crate::credentials::CredentialLoader;
use crate::types::{CustodyError, Result, TxPhase};

use super::channel::LedgerConnector;
use super::connection::TenantConnection;
use super::protocol::{
    self, CommitResult, ContractHandle, EndorseResult, EvaluateResult, FrameBuilder, Operation,
    ProposeResult, COMMIT_STATUS_VALID,
};

/// Per-phase dispatch deadlines.
///
/// Evaluate and Propose are single round trips; Endorse waits on multiple
/// parties; CommitStatus waits on block finality and gets the longest budget.
#[derive(Debug, Clone)]
pub struct DeadlineProfile {
    pub evaluate: Duration,
    pub propose: Duration,
    pub endorse: Duration,
    pub commit_status: Duration,
}

impl DeadlineProfile {
    pub fn from_millis(evaluate: u64, propose: u64, endorse: u64, commit_status: u64) -> Self {
        Self {
            evaluate: Duration::from_millis(evaluate),
            propose: Duration::from_millis(propose),
            endorse: Duration::from_millis(endorse),
            commit_status: Duration::from_millis(commit_status),
        }
    }
}

impl Default for DeadlineProfile {
    fn default() -> Self {
        Self::from_millis(5_000, 5_000, 15_000, 60_000)
    }
}

/// Snapshot of one organization's connection state.
#[derive(Debug, Clone)]
pub struct OrgStatus {
    pub org: String,
    pub msp_id: String,
    pub connected: bool,
}

/// Registry of tenant connections, keyed by organization name.
pub struct ConnectionRegistry {
    /// org name → connection (Ready organizations only)
    connections: DashMap<String, Arc<TenantConnection>>,
    /// MSP id → org name lookup table for request hints
    msp_table: DashMap<String, String>,
    /// Organization used when resolution finds nothing Ready
    default_org: String,
    deadlines: DeadlineProfile,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new(default_org: &str, deadlines: DeadlineProfile) -> Self {
        Self {
            connections: DashMap::new(),
            msp_table: DashMap::new(),
            default_org: default_org.to_string(),
            deadlines,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Attempt Connecting → Ready for every configured organization.
    ///
    /// Each organization's identity/signer/channel setup runs as one
    /// independent unit of work; all units run concurrently and a failure in
    /// one neither blocks nor aborts the others. Returns the number of Ready
    /// organizations; zero is fatal.
    pub async fn initialize_all(
        &self,
        configs: &[OrgConfig],
        loader: &CredentialLoader,
        connector: &dyn LedgerConnector,
        contract: &ContractHandle,
    ) -> Result<usize> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(CustodyError::GatewayNotInitialized(
                "Registry has been shut down".to_string(),
            ));
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(CustodyError::Configuration(
                "Registry is already initialized".to_string(),
            ));
        }

        // Hint table covers every configured org, Ready or not, so a hint for
        // a failed org still resolves to a name (and then falls back loudly).
        for config in configs {
            self.msp_table
                .insert(config.msp_id.clone(), config.name.clone());
        }

        let units = configs.iter().map(|config| async move {
            let result = init_org(config, loader, connector, contract).await;
            (config.name.clone(), result)
        });

        let mut ready = 0usize;
        for (org, result) in futures::future::join_all(units).await {
            match result {
                Ok(connection) => {
                    info!(org = %org, "Organization connection ready");
                    self.connections.insert(org, Arc::new(connection));
                    ready += 1;
                }
                Err(e) => {
                    warn!(
                        org = %org,
                        error = %e,
                        "Organization failed to initialize, continuing without it"
                    );
                }
            }
        }

        if ready == 0 {
            return Err(CustodyError::Configuration(
                "No organization reached a ready ledger connection".to_string(),
            ));
        }

        Ok(ready)
    }

    /// Register an already-built connection (tests, late provisioning).
    pub fn insert_connection(&self, connection: TenantConnection) {
        self.msp_table
            .insert(connection.identity.msp_id.clone(), connection.org.clone());
        self.connections
            .insert(connection.org.clone(), Arc::new(connection));
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Step one of resolution: map a hint to an organization name.
    ///
    /// A hint is either an MSP id (lookup table) or a literal organization
    /// name already known to the registry.
    pub fn resolve_org_name(&self, hint: Option<&str>) -> Option<String> {
        let hint = hint?;
        if let Some(org) = self.msp_table.get(hint) {
            return Some(org.clone());
        }
        if self.connections.contains_key(hint) {
            return Some(hint.to_string());
        }
        None
    }

    /// Step two: organization name → connection, with default fallback.
    pub fn resolve(&self, org_hint: Option<&str>) -> Result<Arc<TenantConnection>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(CustodyError::GatewayNotInitialized(
                "Registry has been shut down".to_string(),
            ));
        }

        match self.resolve_org_name(org_hint) {
            Some(org) => {
                if let Some(connection) = self.connections.get(&org) {
                    debug!(org = %org, "Resolved tenant connection");
                    return Ok(Arc::clone(&connection));
                }
                // Deliberate availability/isolation trade-off: the request
                // proceeds under the default tenant's identity.
                warn!(
                    requested = %org,
                    fallback = %self.default_org,
                    "No ready connection for requested organization, redirecting to default tenant identity"
                );
            }
            None => match org_hint {
                Some(hint) => warn!(
                    hint = %hint,
                    fallback = %self.default_org,
                    "Unresolvable organization hint, redirecting to default tenant identity"
                ),
                None => debug!(org = %self.default_org, "No hint, using default organization"),
            },
        }

        self.connections
            .get(&self.default_org)
            .map(|connection| Arc::clone(&connection))
            .ok_or_else(|| {
                CustodyError::GatewayNotInitialized(format!(
                    "No ready connection for default organization '{}'",
                    self.default_org
                ))
            })
    }

    /// Dispatch a ledger operation under the resolved tenant identity.
    ///
    /// Evaluate is a single deadline-bound round trip. Submit is staged
    /// through propose, endorse, and commit-status, each phase bounded by its
    /// own deadline. A phase that exceeds its deadline fails with the phase
    /// name and is never retried here: retry safety after endorsement is the
    /// caller's call.
    pub async fn dispatch(
        &self,
        org_hint: Option<&str>,
        operation: Operation,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let connection = self.resolve(org_hint)?;
        let builder = FrameBuilder::new(
            &connection.contract,
            &connection.identity,
            &connection.signer,
        );

        match operation {
            Operation::Evaluate => {
                let frame = builder.evaluate(function, args)?;
                let response = self
                    .phased_request(&connection, frame, self.deadlines.evaluate, TxPhase::Evaluate)
                    .await?;
                let result: EvaluateResult = protocol::parse_response(&response)?;
                decode_payload(&result.payload)
            }
            Operation::Submit => {
                let transaction_id = Uuid::new_v4().to_string();
                debug!(
                    org = %connection.org,
                    function = %function,
                    transaction_id = %transaction_id,
                    "Submitting transaction"
                );

                let frame = builder.propose(&transaction_id, function, args)?;
                let response = self
                    .phased_request(&connection, frame, self.deadlines.propose, TxPhase::Propose)
                    .await?;
                let proposal: ProposeResult = protocol::parse_response(&response)?;

                let frame = builder.endorse(&proposal.transaction_id)?;
                let response = self
                    .phased_request(&connection, frame, self.deadlines.endorse, TxPhase::Endorse)
                    .await?;
                let endorsement: EndorseResult = protocol::parse_response(&response)?;
                debug!(
                    transaction_id = %transaction_id,
                    endorsements = endorsement.endorsements,
                    "Endorsements collected"
                );

                let frame = builder.commit_status(&transaction_id)?;
                let response = self
                    .phased_request(
                        &connection,
                        frame,
                        self.deadlines.commit_status,
                        TxPhase::CommitStatus,
                    )
                    .await?;
                let commit: CommitResult = protocol::parse_response(&response)?;

                if commit.status != COMMIT_STATUS_VALID {
                    return Err(CustodyError::Ledger(format!(
                        "Transaction {transaction_id} failed validation with status {}",
                        commit.status
                    )));
                }

                info!(
                    org = %connection.org,
                    function = %function,
                    transaction_id = %transaction_id,
                    "Transaction committed"
                );
                decode_payload(&commit.payload)
            }
        }
    }

    /// Organizations with a Ready connection.
    pub fn initialized_orgs(&self) -> Vec<String> {
        let mut orgs: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        orgs.sort();
        orgs
    }

    /// Connection-state snapshot for operational logging.
    pub async fn status(&self) -> Vec<OrgStatus> {
        // Snapshot the map before probing so no shard guard is held across
        // an await point.
        let snapshot: Vec<_> = self
            .connections
            .iter()
            .map(|entry| {
                (
                    entry.org.clone(),
                    entry.identity.msp_id.clone(),
                    Arc::clone(&entry.channel),
                )
            })
            .collect();

        let mut statuses = Vec::new();
        for (org, msp_id, channel) in snapshot {
            statuses.push(OrgStatus {
                org,
                msp_id,
                connected: channel.is_connected().await,
            });
        }
        statuses.sort_by(|a, b| a.org.cmp(&b.org));
        statuses
    }

    /// Release every tenant connection. Safe to call more than once; any
    /// later `resolve`/`dispatch` fails with `GatewayNotInitialized`.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.connections.len();
        self.connections.clear();
        self.msp_table.clear();
        info!(connections = released, "Registry shut down");
    }

    async fn phased_request(
        &self,
        connection: &TenantConnection,
        frame: Vec<u8>,
        deadline: Duration,
        phase: TxPhase,
    ) -> Result<Vec<u8>> {
        match timeout(deadline, connection.channel.request(frame)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    org = %connection.org,
                    phase = %phase,
                    deadline_ms = deadline.as_millis() as u64,
                    "Ledger phase exceeded its deadline"
                );
                Err(CustodyError::TransactionTimeout { phase })
            }
        }
    }
}

/// One organization's Connecting step: identity, signer, channel, as a unit.
async fn init_org(
    config: &OrgConfig,
    loader: &CredentialLoader,
    connector: &dyn LedgerConnector,
    contract: &ContractHandle,
) -> Result<TenantConnection> {
    let identity = loader.load_identity(&config.name, &config.msp_id).await?;
    let signer = loader.load_signer(&config.name).await?;
    let channel = connector.connect(&config.name, &config.ledger_url).await?;

    Ok(TenantConnection::new(
        identity,
        signer,
        channel,
        contract.clone(),
    ))
}

fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| CustodyError::Ledger(format!("Invalid base64 payload: {e}")))
}
