//! Deployment plan composition.
//!
//! Pure: given the resolved slot, the detected mode, and the uploaded
//! content identifier, compose the registry writes the deployment needs.
//! Nothing here talks to a service; the driver decides how the plan's calls
//! are submitted.
//!
//! Two properties are fixed at composition time and hold in both modes:
//!
//! - the child node is owned by the governance account, whoever creates it;
//! - the permanent-publication fuse mask and the far-future expiry are baked
//!   into the create call itself, so the node is immutable from the moment
//!   it exists, not after a later step that could be skipped.

use lockstone_types::{
    Address, ContentId, ContentPointer, DeployError, DeploymentMode, DeploymentPlan, Fuses, Name,
    RegistryCall, VersionSlot, FAR_FUTURE_EXPIRY,
};

/// Compose the plan for publishing `content_id` as `v{slot}` under `parent`.
pub fn build_plan(
    mode: DeploymentMode,
    parent: &Name,
    slot: VersionSlot,
    content_id: ContentId,
    governance_account: Address,
) -> Result<DeploymentPlan, DeployError> {
    let label = slot.label();
    let child = parent
        .child(&label)
        .expect("slot labels are always valid name labels");
    let pointer = ContentPointer::encode(&content_id);

    let create = RegistryCall::CreateChild {
        parent: parent.node(),
        label: label.clone(),
        owner: governance_account,
        fuses: Fuses::PERMANENT_PUBLICATION,
        expiry: FAR_FUTURE_EXPIRY,
    };
    let set_content = RegistryCall::SetContentPointer {
        node: child.node(),
        pointer: pointer.clone(),
    };

    let plan = DeploymentPlan::new(
        mode,
        slot,
        child,
        content_id,
        pointer,
        Fuses::PERMANENT_PUBLICATION,
        FAR_FUTURE_EXPIRY,
        create,
        set_content,
    )?;

    tracing::debug!(
        name = %plan.name(),
        mode = %plan.mode(),
        pointer = %plan.pointer(),
        "composed deployment plan"
    );
    Ok(plan)
}
