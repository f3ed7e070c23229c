//! Configuration for the custody gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;

/// Custody Gateway - ledger connection registry and evidence pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "custody-gateway")]
#[command(about = "Multi-organization ledger gateway for digital evidence custody")]
pub struct Args {
    /// Master secret for per-object key derivation (64 hex chars = 32 bytes).
    /// Required; the process must not serve traffic without it.
    #[arg(long, env = "CUSTODY_MASTER_KEY", hide_env_values = true)]
    pub master_key: Option<String>,

    /// Base URL of the content-addressed store HTTP API
    #[arg(long, env = "CONTENT_STORE_URL", default_value = "http://localhost:5001")]
    pub store_url: String,

    /// Content store client timeout in milliseconds
    #[arg(long, env = "CONTENT_STORE_TIMEOUT_MS", default_value = "15000")]
    pub store_timeout_ms: u64,

    /// Root directory of per-organization credential trees.
    /// Layout: {root}/{org}/ca.crt, {root}/{org}/cert.pem,
    /// {root}/{org}/keystore/<one file ending in _sk>
    #[arg(long, env = "CREDENTIAL_ROOT", default_value = "./credentials")]
    pub credential_root: String,

    /// Comma-separated organization specs: name=MSPID@ledger-url
    /// e.g. "org1=Org1MSP@ws://localhost:7051,org2=Org2MSP@ws://localhost:9051"
    #[arg(long, env = "ORGS")]
    pub orgs: Option<String>,

    /// Organization used when a request hint resolves to no Ready connection
    #[arg(long, env = "DEFAULT_ORG", default_value = "org1")]
    pub default_org: String,

    /// Ledger network (channel) the contract is deployed on
    #[arg(long, env = "LEDGER_NETWORK", default_value = "custodychannel")]
    pub ledger_network: String,

    /// Name of the deployed evidence contract
    #[arg(long, env = "LEDGER_CONTRACT", default_value = "evidence")]
    pub ledger_contract: String,

    /// Deadline for read-only Evaluate calls, in milliseconds
    #[arg(long, env = "EVALUATE_TIMEOUT_MS", default_value = "5000")]
    pub evaluate_timeout_ms: u64,

    /// Deadline for the Submit proposal phase, in milliseconds
    #[arg(long, env = "PROPOSE_TIMEOUT_MS", default_value = "5000")]
    pub propose_timeout_ms: u64,

    /// Deadline for the Submit endorsement phase, in milliseconds
    #[arg(long, env = "ENDORSE_TIMEOUT_MS", default_value = "15000")]
    pub endorse_timeout_ms: u64,

    /// Deadline for the Submit commit-status phase, in milliseconds.
    /// Waits for block finality, so it is allowed substantially longer.
    #[arg(long, env = "COMMIT_TIMEOUT_MS", default_value = "60000")]
    pub commit_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// One organization entry parsed from the ORGS spec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgConfig {
    /// Organization name (also the credential subdirectory name)
    pub name: String,
    /// Membership service provider ID used in request hints and frames
    pub msp_id: String,
    /// WebSocket URL of this organization's ledger endpoint
    pub ledger_url: String,
}

impl Args {
    /// Parse the ORGS spec string into per-organization configs.
    ///
    /// Format per entry: `name=MSPID@url`. Malformed entries are rejected so
    /// a typo fails startup instead of silently dropping a tenant.
    pub fn org_configs(&self) -> Result<Vec<OrgConfig>, String> {
        let Some(ref spec) = self.orgs else {
            return Err("ORGS is required (name=MSPID@url, comma-separated)".to_string());
        };

        let mut configs = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, rest) = entry
                .split_once('=')
                .ok_or_else(|| format!("Malformed org spec '{entry}': missing '='"))?;
            let (msp_id, url) = rest
                .split_once('@')
                .ok_or_else(|| format!("Malformed org spec '{entry}': missing '@'"))?;

            if name.is_empty() || msp_id.is_empty() || url.is_empty() {
                return Err(format!("Malformed org spec '{entry}': empty field"));
            }

            configs.push(OrgConfig {
                name: name.to_string(),
                msp_id: msp_id.to_string(),
                ledger_url: url.to_string(),
            });
        }

        if configs.is_empty() {
            return Err("ORGS parsed to zero organizations".to_string());
        }

        Ok(configs)
    }

    /// Validate configuration before serving
    pub fn validate(&self) -> Result<(), String> {
        let Some(ref key) = self.master_key else {
            return Err("CUSTODY_MASTER_KEY is required".to_string());
        };
        if key.len() != 64 || hex::decode(key).is_err() {
            return Err("CUSTODY_MASTER_KEY must be 64 hex characters".to_string());
        }

        let configs = self.org_configs()?;
        if !configs.iter().any(|c| c.name == self.default_org) {
            return Err(format!(
                "DEFAULT_ORG '{}' is not among the configured organizations",
                self.default_org
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["custody-gateway"])
    }

    #[test]
    fn test_org_spec_parsing() {
        let mut args = base_args();
        args.orgs = Some(
            "org1=Org1MSP@ws://localhost:7051, org2=Org2MSP@ws://localhost:9051".to_string(),
        );

        let configs = args.org_configs().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "org1");
        assert_eq!(configs[0].msp_id, "Org1MSP");
        assert_eq!(configs[0].ledger_url, "ws://localhost:7051");
        assert_eq!(configs[1].name, "org2");
    }

    #[test]
    fn test_org_spec_rejects_malformed_entries() {
        let mut args = base_args();
        args.orgs = Some("org1-Org1MSP-ws://localhost:7051".to_string());
        assert!(args.org_configs().is_err());

        args.orgs = Some("org1=Org1MSP".to_string());
        assert!(args.org_configs().is_err());

        args.orgs = Some("=Org1MSP@ws://x".to_string());
        assert!(args.org_configs().is_err());
    }

    #[test]
    fn test_validate_requires_master_key() {
        let mut args = base_args();
        args.orgs = Some("org1=Org1MSP@ws://localhost:7051".to_string());

        args.master_key = None;
        assert!(args.validate().is_err());

        args.master_key = Some("not-hex".to_string());
        assert!(args.validate().is_err());

        args.master_key = Some("ab".repeat(32));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_default_org_must_be_configured() {
        let mut args = base_args();
        args.orgs = Some("org2=Org2MSP@ws://localhost:9051".to_string());
        args.master_key = Some("cd".repeat(32));
        // default_org is "org1", which is not in the spec
        assert!(args.validate().is_err());

        args.default_org = "org2".to_string();
        assert!(args.validate().is_ok());
    }
}
