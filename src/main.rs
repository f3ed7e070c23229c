//! Custody Gateway - evidence custody pipeline

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_gateway::{
    config::Args,
    credentials::CredentialLoader,
    keys::{KeyService, MasterKey},
    ledger::{ConnectionRegistry, ContractHandle, DeadlineProfile, WsLedgerConnector},
    pipeline::CustodyPipeline,
    store::{ContentStore, HttpContentStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("custody_gateway={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }
    let org_configs = match args.org_configs() {
        Ok(configs) => configs,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("======================================");
    info!("  Custody Gateway");
    info!("======================================");
    info!("Content store: {}", args.store_url);
    info!("Credential root: {}", args.credential_root);
    info!("Ledger network: {}", args.ledger_network);
    info!("Contract: {}", args.ledger_contract);
    info!("Default org: {}", args.default_org);
    info!("Organizations: {}", org_configs.len());
    for config in &org_configs {
        info!("  {} ({}) -> {}", config.name, config.msp_id, config.ledger_url);
    }
    info!(
        "Deadlines: evaluate {}ms, propose {}ms, endorse {}ms, commit {}ms",
        args.evaluate_timeout_ms,
        args.propose_timeout_ms,
        args.endorse_timeout_ms,
        args.commit_timeout_ms
    );
    info!("======================================");

    // Master key is required before anything touches evidence bytes
    let master = match MasterKey::from_hex(args.master_key.as_deref()) {
        Ok(master) => master,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let keys = Arc::new(KeyService::new(master));

    let store = Arc::new(HttpContentStore::new(
        &args.store_url,
        Duration::from_millis(args.store_timeout_ms),
    ));
    if store.is_available().await {
        info!("Content store reachable");
    } else {
        warn!(
            "Content store at {} is not reachable; uploads will fail fast until it returns",
            args.store_url
        );
    }

    let loader = CredentialLoader::new(&args.credential_root);
    let contract = ContractHandle {
        network: args.ledger_network.clone(),
        contract: args.ledger_contract.clone(),
    };
    let deadlines = DeadlineProfile::from_millis(
        args.evaluate_timeout_ms,
        args.propose_timeout_ms,
        args.endorse_timeout_ms,
        args.commit_timeout_ms,
    );

    let registry = Arc::new(ConnectionRegistry::new(&args.default_org, deadlines));
    let ready = registry
        .initialize_all(&org_configs, &loader, &WsLedgerConnector, &contract)
        .await?;
    info!(
        ready,
        configured = org_configs.len(),
        orgs = ?registry.initialized_orgs(),
        "Ledger connections initialized"
    );

    let _pipeline = CustodyPipeline::new(Arc::clone(&registry), store, keys);
    info!("Custody pipeline ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    registry.shutdown();

    Ok(())
}
