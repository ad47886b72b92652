//! Version-slot race scenarios.
//!
//! Two deployments can scan the same registry state and pick the same slot;
//! the registry's atomic create guarantees at most one wins. The loser must
//! see a conflict - not a silent overwrite - and recover by recomputing.

use std::time::Duration;

use crate::common::{
    MockGovernance, MockRegistry, MockStorage, individual_account, parent_name,
    sample_content_id, settings_for,
};
use lockstone_core::{CancelFlag, DeploySource, Driver};
use lockstone_providers::governance::GovernanceClient;
use lockstone_providers::registry::RegistryClient;
use lockstone_providers::retry::RetryConfig;
use lockstone_providers::storage::StorageClient;
use lockstone_types::{Address, DeployError, Fuses, VersionSlot, FAR_FUTURE_EXPIRY};
use lockstone_providers::RegistryWrite;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter_factor: 0.0,
    }
}

async fn build(
    registry: &MockRegistry,
    governance: &MockGovernance,
    storage: &MockStorage,
) -> Driver<RegistryClient, GovernanceClient, StorageClient> {
    let settings = settings_for(registry, governance, storage);
    let http = lockstone_providers::http_client(Duration::from_secs(5)).unwrap();
    let token = settings.signer_token.expose_secret().to_string();
    let registry_client = RegistryClient::new(
        http.clone(),
        settings.registry_endpoint.clone(),
        Some(token.clone()),
        fast_retry(),
    );
    let governance_client = GovernanceClient::new(
        http.clone(),
        settings.governance_endpoint.clone(),
        token,
        fast_retry(),
    );
    let storage_client = StorageClient::new(http, settings.storage_endpoint.clone(), fast_retry());
    Driver::new(
        settings,
        registry_client,
        governance_client,
        storage_client,
        CancelFlag::new(),
    )
}

#[tokio::test]
async fn losing_the_race_recomputes_and_takes_the_next_slot() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &individual_account());
    registry.occupy("v0", &individual_account());
    registry.occupy("v1", &individual_account());
    // A concurrent deployment grabs v2 between our scan and our create.
    registry.race_once_on("v2");

    let governance = MockGovernance::start(2, None).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = build(&registry, &governance, &storage).await;

    let result = driver
        .deploy(DeploySource::Existing(sample_content_id()))
        .await
        .unwrap();

    assert_eq!(result.slot, VersionSlot::new(3));
    assert_eq!(result.name.as_str(), "v3.demo.site");
    // The raced v2 belongs to the winner; our create only landed on v3.
    assert_eq!(registry.created_labels(), vec!["v3"]);
    let v2 = parent_name().child("v2").unwrap();
    assert_eq!(
        registry.owner_of(&v2),
        Some(individual_account().to_string())
    );
}

#[tokio::test]
async fn direct_create_conflict_maps_to_a_typed_slot_conflict() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &individual_account());
    registry.occupy("v4", &individual_account());

    // Drive the write seam directly with a label that already exists, the
    // way a lost race surfaces from the registry.
    let http = lockstone_providers::http_client(Duration::from_secs(5)).unwrap();
    let client = RegistryClient::new(
        http,
        url::Url::parse(&registry.server.uri()).unwrap(),
        Some("approver-token".to_string()),
        fast_retry(),
    );

    let err = client
        .create_child(
            parent_name().node(),
            "v4",
            Address::parse("0x00000000000000000000000000000000000000a1").unwrap(),
            Fuses::PERMANENT_PUBLICATION,
            FAR_FUTURE_EXPIRY,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::VersionSlotConflict { slot } if slot == VersionSlot::new(4)
    ));
}
