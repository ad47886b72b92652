//! End-to-end deployment scenarios through the real HTTP clients.

use std::time::Duration;

use crate::common::{
    MockGovernance, MockRegistry, MockStorage, governance_account, individual_account,
    parent_name, sample_content_id, settings_for, site_dir,
};
use lockstone_config::Settings;
use lockstone_core::{CancelFlag, DeploySource, Driver};
use lockstone_providers::governance::GovernanceClient;
use lockstone_providers::registry::RegistryClient;
use lockstone_providers::retry::RetryConfig;
use lockstone_providers::storage::StorageClient;
use lockstone_types::{
    DeployError, DeploymentMode, DeploymentOutcome, Fuses, ProposalState, Retryability,
    VersionSlot, FAR_FUTURE_EXPIRY,
};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter_factor: 0.0,
    }
}

fn driver(settings: Settings) -> Driver<RegistryClient, GovernanceClient, StorageClient> {
    let http = lockstone_providers::http_client(Duration::from_secs(5)).unwrap();
    let token = settings.signer_token.expose_secret().to_string();
    let registry = RegistryClient::new(
        http.clone(),
        settings.registry_endpoint.clone(),
        Some(token.clone()),
        fast_retry(),
    );
    let governance = GovernanceClient::new(
        http.clone(),
        settings.governance_endpoint.clone(),
        token,
        fast_retry(),
    );
    let storage = StorageClient::new(http, settings.storage_endpoint.clone(), fast_retry());
    Driver::new(settings, registry, governance, storage, CancelFlag::new())
}

#[tokio::test]
async fn governance_mode_batches_create_and_content_into_one_proposal() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &governance_account());
    registry.occupy("v0", &governance_account());
    registry.occupy("v1", &governance_account());

    let governance = MockGovernance::start(3, None).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = driver(settings_for(&registry, &governance, &storage));

    let dir = site_dir();
    let result = driver
        .deploy(DeploySource::Directory(dir.path().to_path_buf()))
        .await
        .unwrap();

    assert_eq!(result.mode, DeploymentMode::GovernanceOwnsParent);
    assert_eq!(result.slot, VersionSlot::new(2));
    assert_eq!(result.name.as_str(), "v2.demo.site");
    assert_eq!(result.content_id, sample_content_id());
    assert!(matches!(result.outcome, DeploymentOutcome::Proposed { .. }));
    assert_eq!(result.status.state(), ProposalState::AwaitingThreshold);
    assert_eq!(result.status.approved, 1, "submission is the first approval");

    // Exactly one proposal with exactly two operations, in order.
    let proposals = governance.proposals();
    assert_eq!(proposals.len(), 1);
    let operations = proposals[0].1.as_array().unwrap();
    assert_eq!(operations.len(), 2);

    let create = &operations[0]["call"];
    assert_eq!(create["method"], "registry_createChild");
    assert_eq!(create["params"]["label"], "v2");
    assert_eq!(
        create["params"]["owner"],
        governance_account().to_string().as_str()
    );
    assert_eq!(
        create["params"]["fuses"],
        Fuses::PERMANENT_PUBLICATION.bits()
    );
    assert_eq!(create["params"]["expiry"], FAR_FUTURE_EXPIRY);

    let set_content = &operations[1]["call"];
    assert_eq!(set_content["method"], "registry_setContentPointer");
    let pointer = set_content["params"]["pointer"].as_str().unwrap();
    assert!(
        pointer.starts_with("0xe301"),
        "pointer must carry the content-addressed namespace, got {pointer}"
    );

    // Nothing was written directly: both writes live inside the proposal.
    assert!(registry.created_labels().is_empty());
}

#[tokio::test]
async fn individual_mode_creates_directly_and_proposes_content_alone() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &individual_account());

    let governance = MockGovernance::start(2, None).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = driver(settings_for(&registry, &governance, &storage));

    let result = driver
        .deploy(DeploySource::Existing(sample_content_id()))
        .await
        .unwrap();

    assert_eq!(result.mode, DeploymentMode::IndividualOwnsParent);
    assert_eq!(result.slot, VersionSlot::new(0));
    assert!(matches!(
        result.outcome,
        DeploymentOutcome::CreatedAndProposed { .. }
    ));

    // The create executed directly, and the node belongs to governance.
    assert_eq!(registry.created_labels(), vec!["v0"]);
    let child = parent_name().child("v0").unwrap();
    assert_eq!(
        registry.owner_of(&child),
        Some(governance_account().to_string())
    );

    // The proposal carries only the content write.
    let proposals = governance.proposals();
    assert_eq!(proposals.len(), 1);
    let operations = proposals[0].1.as_array().unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["call"]["method"], "registry_setContentPointer");
}

#[tokio::test]
async fn rejected_batch_proposal_leaves_the_registry_untouched() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &governance_account());

    // Governance refuses the submission outright.
    let governance = MockGovernance::start(3, Some(403)).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = driver(settings_for(&registry, &governance, &storage));

    let err = driver
        .deploy(DeploySource::Existing(sample_content_id()))
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Authorization { .. }));
    assert_eq!(err.retryability(), Retryability::Fatal);

    // Atomicity: zero new nodes; the slot number was never consumed.
    assert!(registry.created_labels().is_empty());
    let v0 = parent_name().child("v0").unwrap();
    assert_eq!(registry.owner_of(&v0), None);
}

#[tokio::test]
async fn individual_mode_rejection_reports_the_consumed_slot() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &individual_account());

    let governance = MockGovernance::start(2, Some(403)).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = driver(settings_for(&registry, &governance, &storage));

    let err = driver
        .deploy(DeploySource::Existing(sample_content_id()))
        .await
        .unwrap_err();

    match &err {
        DeployError::PartialDeployment { slot, .. } => {
            assert_eq!(*slot, VersionSlot::new(0));
        }
        other => panic!("expected PartialDeployment, got {other:?}"),
    }
    assert_eq!(err.retryability(), Retryability::AwaitingHuman);

    // The known gap, carried over deliberately: the node exists, the slot is
    // gone, and only a fresh version can recover.
    let v0 = parent_name().child("v0").unwrap();
    assert_eq!(
        registry.owner_of(&v0),
        Some(governance_account().to_string())
    );
}

#[tokio::test]
async fn status_query_follows_a_submitted_proposal() {
    let registry = MockRegistry::start().await;
    registry.set_owner(&parent_name(), &governance_account());

    let governance = MockGovernance::start(3, None).await;
    let storage = MockStorage::start(&sample_content_id()).await;
    let driver = driver(settings_for(&registry, &governance, &storage));

    let result = driver
        .deploy(DeploySource::Existing(sample_content_id()))
        .await
        .unwrap();

    let status = driver.proposal_status(&result.status.id).await.unwrap();
    assert_eq!(status.approved, 1);
    assert_eq!(status.required, 3);
    assert_eq!(status.state(), ProposalState::AwaitingThreshold);
}
