//! Version slot resolution.
//!
//! Slots are dense and monotonic: `v{n}` exists only if `v0..v{n-1}` all
//! exist, so the first unoccupied slot is the next version. Every deployment
//! re-scans from zero - an O(n) linear probe with no caching, which is the
//! right trade at deployment frequency (a few per day at most). The probe is
//! capped so a misbehaving or adversarial registry cannot stall resolution
//! forever.

use lockstone_providers::RegistryRead;
use lockstone_types::{DeployError, Name, VersionSlot};

/// Outcome of a registry scan: the first free slot and the occupied labels
/// found on the way, for display and audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionScan {
    pub next: VersionSlot,
    pub existing: Vec<String>,
}

/// Find the next free version slot under `parent`.
///
/// A slot is occupied iff the registry reports a non-null, non-zero owner
/// for its label. A transport failure aborts the scan: an unreachable
/// registry must never be read as "slot free" (which would collide with an
/// existing version) or "slot occupied" (which would burn a version number).
pub async fn resolve_next_version<R: RegistryRead>(
    registry: &R,
    parent: &Name,
    ceiling: u32,
) -> Result<VersionScan, DeployError> {
    let parent_node = parent.node();
    let mut existing = Vec::new();

    for index in 0..ceiling {
        let slot = VersionSlot::new(index);
        let label = slot.label();
        let owner = registry.get_owner(parent_node.child(&label)).await?;
        match owner {
            Some(_) => existing.push(label),
            None => {
                tracing::debug!(next = %slot, occupied = existing.len(), "resolved version slot");
                return Ok(VersionScan { next: slot, existing });
            }
        }
    }

    Err(DeployError::VersionScanExhausted { ceiling })
}
