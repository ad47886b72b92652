//! Deployment plan data model.
//!
//! Pure domain types with no IO and no async. A [`DeploymentPlan`] is built
//! once per deployment attempt, validated at construction, consumed exactly
//! once by submission, and never mutated. Invalid plans are unrepresentable:
//! the constructor rejects operation lists that disagree with the plan's own
//! slot, pointer, or fuse mask.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contenthash::{ContentId, ContentPointer};
use crate::fuses::Fuses;
use crate::name::{Address, Name, NodeId};

// ── Identifiers ──────────────────────────────────────────────

/// Identifier of a proposal held by the governance backend.
///
/// Opaque to this client: we hold the reference, the backend owns the
/// proposal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a directly-submitted registry write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Version slots ────────────────────────────────────────────

/// A published version number, mapping to child label `v{n}`.
///
/// Slots are dense and monotonic: slot `n` exists only if `0..n` all exist.
/// They are computed fresh by scanning the registry and never persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionSlot(u32);

impl VersionSlot {
    #[must_use]
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The child label this slot publishes under.
    #[must_use]
    pub fn label(self) -> String {
        format!("v{}", self.0)
    }
}

impl fmt::Display for VersionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not a canonical version label")]
pub struct NotAVersionLabel;

/// Parse a `v{n}` label back to its slot. Labels like `v01` are not slot
/// labels: the resolver only ever writes canonical decimal.
impl FromStr for VersionSlot {
    type Err = NotAVersionLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('v').ok_or(NotAVersionLabel)?;
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(NotAVersionLabel);
        }
        digits.parse::<u32>().map(Self).map_err(|_| NotAVersionLabel)
    }
}

// ── Deployment mode ──────────────────────────────────────────

/// Who controls the parent name, and therefore how writes are submitted.
///
/// A closed enum consumed by exhaustive matches: adding a third mode is a
/// compile-time-checked change, not a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    /// The governance account owns the parent: create-child and
    /// set-content-pointer batch into one atomic proposal.
    GovernanceOwnsParent,
    /// An individual owns the parent: create-child executes directly, then
    /// set-content-pointer goes to governance alone.
    IndividualOwnsParent,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GovernanceOwnsParent => f.write_str("governance-owns-parent"),
            Self::IndividualOwnsParent => f.write_str("individual-owns-parent"),
        }
    }
}

// ── Registry data & calls ────────────────────────────────────

/// A node's registry record, as reads return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryNode {
    pub owner: Option<Address>,
    pub fuses: Fuses,
    pub expiry: u64,
}

/// A registry write, in the wire encoding both the registry endpoint and the
/// governance backend accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RegistryCall {
    #[serde(rename = "registry_createChild")]
    CreateChild {
        parent: NodeId,
        label: String,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    },
    #[serde(rename = "registry_setContentPointer")]
    SetContentPointer {
        node: NodeId,
        pointer: ContentPointer,
    },
    #[serde(rename = "registry_setFuses")]
    SetFuses { node: NodeId, fuses: Fuses },
}

/// One pending write inside a governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalOperation {
    /// The node the write touches, for audit display in the approval flow.
    pub target: NodeId,
    pub call: RegistryCall,
    /// Native value attached to the call. Always zero for publications.
    pub value: u64,
}

// ── Deployment plan ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("create operation does not match plan slot {0}")]
    CreateMismatch(VersionSlot),
    #[error("content operation does not match plan pointer")]
    ContentMismatch,
    #[error("create operation must burn the permanent-publication fuses, got {0:?}")]
    WrongFuses(Fuses),
    #[error("plan label {label:?} is not the label of slot {slot}")]
    LabelMismatch { label: String, slot: VersionSlot },
}

/// Everything one deployment attempt is going to write, fixed up front.
///
/// The two registry calls are stored in execution order: create-child first,
/// set-content-pointer second. How they are submitted - one atomic proposal
/// or a direct write plus a proposal - is the mode's decision, made in
/// [`Self::operations`] consumers, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    mode: DeploymentMode,
    slot: VersionSlot,
    label: String,
    name: Name,
    content_id: ContentId,
    pointer: ContentPointer,
    fuses: Fuses,
    expiry: u64,
    create: RegistryCall,
    set_content: RegistryCall,
}

impl DeploymentPlan {
    /// Validate and freeze a plan.
    ///
    /// The caller supplies the calls it composed; construction cross-checks
    /// them against the plan's own fields so a slot/pointer/fuse mismatch
    /// cannot survive into submission.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: DeploymentMode,
        slot: VersionSlot,
        name: Name,
        content_id: ContentId,
        pointer: ContentPointer,
        fuses: Fuses,
        expiry: u64,
        create: RegistryCall,
        set_content: RegistryCall,
    ) -> Result<Self, PlanError> {
        let label = slot.label();

        match &create {
            RegistryCall::CreateChild {
                label: call_label,
                fuses: call_fuses,
                expiry: call_expiry,
                ..
            } => {
                if *call_label != label || *call_expiry != expiry {
                    return Err(PlanError::CreateMismatch(slot));
                }
                if *call_fuses != fuses {
                    return Err(PlanError::WrongFuses(*call_fuses));
                }
            }
            _ => return Err(PlanError::CreateMismatch(slot)),
        }

        match &set_content {
            RegistryCall::SetContentPointer {
                node,
                pointer: call_pointer,
            } => {
                if *call_pointer != pointer || *node != name.node() {
                    return Err(PlanError::ContentMismatch);
                }
            }
            _ => return Err(PlanError::ContentMismatch),
        }

        let first_label = name.labels().next().unwrap_or_default().to_string();
        if first_label != label {
            return Err(PlanError::LabelMismatch {
                label: first_label,
                slot,
            });
        }

        Ok(Self {
            mode,
            slot,
            label,
            name,
            content_id,
            pointer,
            fuses,
            expiry,
            create,
            set_content,
        })
    }

    #[must_use]
    pub const fn mode(&self) -> DeploymentMode {
        self.mode
    }

    #[must_use]
    pub const fn slot(&self) -> VersionSlot {
        self.slot
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The full child name being published (`v2.demo.site`).
    #[must_use]
    pub const fn name(&self) -> &Name {
        &self.name
    }

    #[must_use]
    pub const fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    #[must_use]
    pub const fn pointer(&self) -> &ContentPointer {
        &self.pointer
    }

    #[must_use]
    pub const fn fuses(&self) -> Fuses {
        self.fuses
    }

    #[must_use]
    pub const fn expiry(&self) -> u64 {
        self.expiry
    }

    #[must_use]
    pub const fn create_call(&self) -> &RegistryCall {
        &self.create
    }

    #[must_use]
    pub const fn set_content_call(&self) -> &RegistryCall {
        &self.set_content
    }

    /// The plan's writes as proposal operations, in execution order.
    ///
    /// `parent` is the node the create call runs against; the content call
    /// targets the child node itself.
    #[must_use]
    pub fn operations(&self, parent: NodeId) -> Vec<ProposalOperation> {
        vec![
            ProposalOperation {
                target: parent,
                call: self.create.clone(),
                value: 0,
            },
            ProposalOperation {
                target: self.name.node(),
                call: self.set_content.clone(),
                value: 0,
            },
        ]
    }

    /// Just the content write, for the individual-owns-parent path where
    /// create has already executed directly.
    #[must_use]
    pub fn content_operation(&self) -> Vec<ProposalOperation> {
        vec![ProposalOperation {
            target: self.name.node(),
            call: self.set_content.clone(),
            value: 0,
        }]
    }
}

// ── Proposal status ──────────────────────────────────────────

/// Lifecycle position of a submitted proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    /// Below threshold; waiting on approvers. Not an error state, however
    /// long it lasts.
    AwaitingThreshold,
    /// Threshold met; any party may execute.
    ReadyToExecute,
    /// Executed on the registry.
    Executed,
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingThreshold => f.write_str("awaiting-threshold"),
            Self::ReadyToExecute => f.write_str("ready-to-execute"),
            Self::Executed => f.write_str("executed"),
        }
    }
}

/// Snapshot of a proposal as reported by the governance backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStatus {
    pub id: ProposalId,
    pub approved: u32,
    pub required: u32,
    pub executed: bool,
}

impl ProposalStatus {
    #[must_use]
    pub const fn state(&self) -> ProposalState {
        if self.executed {
            ProposalState::Executed
        } else if self.approved >= self.required {
            ProposalState::ReadyToExecute
        } else {
            ProposalState::AwaitingThreshold
        }
    }
}

// ── Terminal result ──────────────────────────────────────────

/// How the plan's writes were handed off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    /// Governance mode: one atomic proposal carrying both writes.
    Proposed { proposal: ProposalId },
    /// Individual mode: create executed directly, content write proposed.
    CreatedAndProposed { tx: TxId, proposal: ProposalId },
}

/// What a deployment run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub mode: DeploymentMode,
    pub slot: VersionSlot,
    pub name: Name,
    pub content_id: ContentId,
    pub outcome: DeploymentOutcome,
    pub status: ProposalStatus,
}
