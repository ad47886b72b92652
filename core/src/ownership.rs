//! Deployment mode detection.
//!
//! Whoever owns the parent name decides how writes are submitted, so the
//! owner is read fresh on every deployment - ownership can change between
//! runs, and a cached answer would build the wrong kind of transaction.

use lockstone_providers::RegistryRead;
use lockstone_types::{Address, DeployError, DeploymentMode, Name};

/// Classify who controls `parent`.
///
/// The comparison is exact equality of canonicalized identifiers (parsing
/// already lowercases, as account identifiers are not case-sensitive in this
/// domain). There is no fuzzy or partial match: the governance account owns
/// the parent, or an individual does.
pub async fn detect_mode<R: RegistryRead>(
    registry: &R,
    parent: &Name,
    governance_account: Address,
) -> Result<DeploymentMode, DeployError> {
    let owner = registry.get_owner(parent.node()).await?;
    match owner {
        Some(owner) if owner == governance_account => {
            tracing::debug!(%parent, "governance account controls the parent");
            Ok(DeploymentMode::GovernanceOwnsParent)
        }
        Some(owner) => {
            tracing::debug!(%parent, %owner, "individual account controls the parent");
            Ok(DeploymentMode::IndividualOwnsParent)
        }
        None => Err(DeployError::Config(format!(
            "parent name {parent} is not registered; register it before publishing versions"
        ))),
    }
}
