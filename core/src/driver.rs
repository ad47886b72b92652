//! The orchestration driver.
//!
//! Sequences one deployment end to end: upload, version resolution, mode
//! detection, plan composition, submission. The pipeline is cancellable
//! between steps but never mid-operation - once a write or submission has
//! been sent it runs to completion, and a cancelled wait simply leaves any
//! submitted proposal live in the governance backend for later resumption.
//!
//! Retry policy at this level is deliberately small: transport retries
//! already happened inside the clients, so the driver only handles
//! [`DeployError::VersionSlotConflict`] - losing the create race to a
//! concurrent deployment - by recomputing the next slot and trying exactly
//! once more.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lockstone_config::Settings;
use lockstone_providers::{ContentStore, Governance, RegistryRead, RegistryWrite};
use lockstone_types::{
    ContentId, DeployError, DeploymentMode, DeploymentOutcome, DeploymentPlan, DeploymentResult,
    PlanError, ProposalId, ProposalStatus, RegistryCall,
};

use crate::ownership::detect_mode;
use crate::planner::build_plan;
use crate::version::{VersionScan, resolve_next_version};

/// Cooperative cancellation shared between the driver and the signal
/// handler. Checked between pipeline steps only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to publish: a directory to upload, or an identifier from an upload
/// that already happened.
#[derive(Debug, Clone)]
pub enum DeploySource {
    Directory(PathBuf),
    Existing(ContentId),
}

pub struct Driver<R, G, S> {
    settings: Settings,
    registry: R,
    governance: G,
    store: S,
    cancel: CancelFlag,
}

impl<R, G, S> Driver<R, G, S>
where
    R: RegistryRead + RegistryWrite,
    G: Governance,
    S: ContentStore,
{
    pub fn new(settings: Settings, registry: R, governance: G, store: S, cancel: CancelFlag) -> Self {
        Self {
            settings,
            registry,
            governance,
            store,
            cancel,
        }
    }

    /// Run one deployment to its terminal state.
    pub async fn deploy(&self, source: DeploySource) -> Result<DeploymentResult, DeployError> {
        self.checkpoint("artifact upload")?;
        let content_id = match source {
            DeploySource::Directory(dir) => {
                let (content_id, bytes) = self.store.upload_dir(&dir).await?;
                tracing::info!(%content_id, bytes, "artifact uploaded");
                content_id
            }
            DeploySource::Existing(content_id) => content_id,
        };

        self.checkpoint("version resolution")?;
        match self.attempt(&content_id).await {
            Err(DeployError::VersionSlotConflict { slot }) => {
                // A concurrent deployment won the slot between our scan and
                // our create. The registry's create is atomic, so exactly
                // one of us holds it; rescan and take the next one.
                tracing::warn!(%slot, "lost version slot race; recomputing");
                self.checkpoint("conflict retry")?;
                self.attempt(&content_id).await
            }
            other => other,
        }
    }

    /// One resolve-detect-build-submit pass.
    async fn attempt(&self, content_id: &ContentId) -> Result<DeploymentResult, DeployError> {
        let scan = resolve_next_version(
            &self.registry,
            &self.settings.parent_name,
            self.settings.max_version_scan,
        )
        .await?;
        tracing::info!(
            next = %scan.next,
            existing = ?scan.existing,
            "resolved next version"
        );

        // Fresh per deployment: ownership can change between runs.
        let mode = detect_mode(
            &self.registry,
            &self.settings.parent_name,
            self.settings.governance_account,
        )
        .await?;

        let plan = build_plan(
            mode,
            &self.settings.parent_name,
            scan.next,
            content_id.clone(),
            self.settings.governance_account,
        )?;

        self.checkpoint("submission")?;
        self.submit(plan).await
    }

    /// Hand the plan off according to its mode.
    async fn submit(&self, plan: DeploymentPlan) -> Result<DeploymentResult, DeployError> {
        let parent_node = self.settings.parent_name.node();
        match plan.mode() {
            DeploymentMode::GovernanceOwnsParent => {
                // Both writes in one atomic proposal: either the version
                // node appears with its content, or nothing appears and the
                // slot number is never consumed.
                let operations = plan.operations(parent_node);
                let status = self.governance.propose(&operations).await?;
                Ok(self.result(
                    &plan,
                    DeploymentOutcome::Proposed {
                        proposal: status.id.clone(),
                    },
                    status,
                ))
            }
            DeploymentMode::IndividualOwnsParent => {
                // The individual has unilateral authority to create the
                // child, but only the node's owner - governance - may set
                // its content, so that write still goes through approval.
                let RegistryCall::CreateChild {
                    parent,
                    label,
                    owner,
                    fuses,
                    expiry,
                } = plan.create_call()
                else {
                    return Err(DeployError::Plan(PlanError::CreateMismatch(plan.slot())));
                };
                let tx = self
                    .registry
                    .create_child(*parent, label, *owner, *fuses, *expiry)
                    .await?;
                tracing::info!(name = %plan.name(), %tx, "version node created directly");

                // Known gap, carried over deliberately: if this proposal is
                // rejected or never submitted, the slot stays consumed with
                // no content. Slots are never reused, so the only recovery
                // is a fresh version.
                match self.governance.propose(&plan.content_operation()).await {
                    Ok(status) => Ok(self.result(
                        &plan,
                        DeploymentOutcome::CreatedAndProposed {
                            tx,
                            proposal: status.id.clone(),
                        },
                        status,
                    )),
                    Err(err) => Err(DeployError::PartialDeployment {
                        slot: plan.slot(),
                        detail: format!(
                            "create executed ({tx}) but the content proposal failed: {err}"
                        ),
                    }),
                }
            }
        }
    }

    fn result(
        &self,
        plan: &DeploymentPlan,
        outcome: DeploymentOutcome,
        status: ProposalStatus,
    ) -> DeploymentResult {
        DeploymentResult {
            mode: plan.mode(),
            slot: plan.slot(),
            name: plan.name().clone(),
            content_id: plan.content_id().clone(),
            outcome,
            status,
        }
    }

    /// Status of a previously submitted proposal, for resumption.
    pub async fn proposal_status(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        self.governance.status(id).await
    }

    /// Execute a proposal whose threshold is met.
    pub async fn execute(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        let status = self.governance.status(id).await?;
        if status.approved < status.required {
            return Err(DeployError::GovernanceRejected {
                status: 409,
                detail: format!(
                    "proposal {id} has {}/{} approvals; threshold not met",
                    status.approved, status.required
                ),
            });
        }
        self.governance.execute(id).await
    }

    /// Occupied version labels and the next free slot, for display.
    pub async fn versions(&self) -> Result<VersionScan, DeployError> {
        resolve_next_version(
            &self.registry,
            &self.settings.parent_name,
            self.settings.max_version_scan,
        )
        .await
    }

    fn checkpoint(&self, stage: &'static str) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            tracing::warn!(stage, "deployment cancelled");
            return Err(DeployError::Cancelled { stage });
        }
        Ok(())
    }
}
