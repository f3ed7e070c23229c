//! Registry lifecycle and resolution against the loopback ledger.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use custody_gateway::credentials::CredentialLoader;
use custody_gateway::ledger::{ConnectionRegistry, DeadlineProfile, Operation};
use custody_gateway::types::CustodyError;

use common::{two_org_configs, evidence_contract, write_org_credentials, LoopbackConnector, LoopbackState};

#[tokio::test]
async fn initialize_all_brings_up_every_configured_org() {
    let tmp = TempDir::new().unwrap();
    write_org_credentials(tmp.path(), "org1", 1).await;
    write_org_credentials(tmp.path(), "org2", 2).await;

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org1", DeadlineProfile::default());

    let ready = registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap();

    assert_eq!(ready, 2);
    assert_eq!(registry.initialized_orgs(), vec!["org1", "org2"]);

    let status = registry.status().await;
    assert!(status.iter().all(|s| s.connected));
}

#[tokio::test]
async fn one_failed_org_does_not_block_the_other() {
    let tmp = TempDir::new().unwrap();
    // org1 has no credential directory at all; org2 is complete
    write_org_credentials(tmp.path(), "org2", 2).await;

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org2", DeadlineProfile::default());

    let ready = registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap();

    assert_eq!(ready, 1);
    assert_eq!(registry.initialized_orgs(), vec!["org2"]);

    // A hint for the failed org resolves to its name, finds nothing Ready,
    // and redirects to the default tenant.
    let connection = registry.resolve(Some("Org1MSP")).unwrap();
    assert_eq!(connection.org, "org2");
}

#[tokio::test]
async fn all_orgs_failing_is_fatal() {
    let tmp = TempDir::new().unwrap();

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org1", DeadlineProfile::default());

    let err = registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Configuration(_)));
}

#[tokio::test]
async fn initialize_all_is_a_one_shot_phase() {
    let tmp = TempDir::new().unwrap();
    write_org_credentials(tmp.path(), "org1", 1).await;
    write_org_credentials(tmp.path(), "org2", 2).await;

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org1", DeadlineProfile::default());

    registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap();

    let err = registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Configuration(_)));
}

#[tokio::test]
async fn dispatch_routes_through_fallback_for_unknown_hints() {
    let tmp = TempDir::new().unwrap();
    write_org_credentials(tmp.path(), "org1", 1).await;
    write_org_credentials(tmp.path(), "org2", 2).await;

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org1", DeadlineProfile::default());
    registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap();

    // Unknown hint redirects to the default org; the evaluate itself succeeds
    // and reports "no record" as an empty payload.
    let payload = registry
        .dispatch(
            Some("GhostMSP"),
            Operation::Evaluate,
            "getEvidence",
            &["ev-unknown".to_string()],
        )
        .await
        .unwrap();
    assert!(payload.is_empty());
}

#[tokio::test]
async fn shutdown_blocks_later_dispatch() {
    let tmp = TempDir::new().unwrap();
    write_org_credentials(tmp.path(), "org1", 1).await;
    write_org_credentials(tmp.path(), "org2", 2).await;

    let loader = CredentialLoader::new(tmp.path());
    let connector = LoopbackConnector::new(Arc::new(LoopbackState::default()));
    let registry = ConnectionRegistry::new("org1", DeadlineProfile::default());
    registry
        .initialize_all(&two_org_configs(), &loader, &connector, &evidence_contract())
        .await
        .unwrap();

    registry.shutdown();
    registry.shutdown(); // idempotent

    let err = registry
        .dispatch(None, Operation::Evaluate, "getEvidence", &["ev-1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::GatewayNotInitialized(_)));
}
