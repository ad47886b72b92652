//! The deployment error taxonomy.
//!
//! Every registry, governance, and storage failure is wrapped at the client
//! boundary and re-raised as one of these kinds with its underlying cause
//! preserved. The driver never swallows an error; it reads
//! [`DeployError::retryability`] and either retries within budget or
//! surfaces the error to the operator.

use thiserror::Error;

use crate::contenthash::ContentIdError;
use crate::plan::{PlanError, VersionSlot};

/// Boxed transport/backend cause carried inside taxonomy variants.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How the driver and the exit-code policy should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    /// Do not retry; surface to the operator.
    Fatal,
    /// Retry with backoff within the driver's bounded budget.
    Retryable,
    /// Not a failure of this process: a human has to act (approve, reject,
    /// or publish a fresh version).
    AwaitingHuman,
}

#[derive(Debug, Error)]
pub enum DeployError {
    /// The storage network handed back something that does not parse as a
    /// content identifier. Aborts before any write is attempted.
    #[error("invalid content identifier: {0}")]
    InvalidContentIdentifier(#[from] ContentIdError),

    /// A registry read failed in transport. Never reinterpreted as "slot
    /// free" or "slot occupied".
    #[error("registry read failed during {operation}")]
    RegistryRead {
        operation: &'static str,
        #[source]
        source: BoxedCause,
    },

    /// A registry write failed in transport or was rejected outright.
    #[error("registry write failed during {operation}")]
    RegistryWrite {
        operation: &'static str,
        #[source]
        source: BoxedCause,
    },

    /// Another deployment claimed the slot between our scan and our create.
    /// Retryable: recompute the next slot and try once more.
    #[error("version slot {slot} was claimed concurrently")]
    VersionSlotConflict { slot: VersionSlot },

    /// The version probe hit its ceiling without finding a free slot.
    #[error("no free version slot within the first {ceiling} entries")]
    VersionScanExhausted { ceiling: u32 },

    /// The signer is not an authorized approver of the governance account,
    /// or the credential is missing/invalid.
    #[error("governance rejected the credential: {detail}")]
    Authorization { detail: String },

    /// The governance backend is unreachable or failing.
    #[error("governance backend unavailable")]
    GovernanceUnavailable {
        #[source]
        source: BoxedCause,
    },

    /// The governance backend understood the request and said no: malformed
    /// proposal, unknown proposal id, threshold not met on execute.
    #[error("governance backend refused the request (status {status}): {detail}")]
    GovernanceRejected { status: u16, detail: String },

    /// Individual-owns-parent path: the child node exists but its content
    /// proposal was rejected or never submitted. The slot is consumed; the
    /// only recovery is publishing a fresh version.
    #[error("version {slot} was created but has no content: {detail}")]
    PartialDeployment { slot: VersionSlot, detail: String },

    /// Artifact upload to the content store failed.
    #[error("content upload failed: {detail}")]
    Storage {
        detail: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// Settings were missing or inconsistent at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// A composed plan failed its own validation. Indicates a bug upstream
    /// of submission, so nothing has been written.
    #[error("plan validation failed: {0}")]
    Plan(#[from] PlanError),

    /// The operator interrupted the pipeline between steps. Anything
    /// already proposed stays live in the governance backend.
    #[error("deployment cancelled before {stage}")]
    Cancelled { stage: &'static str },
}

impl DeployError {
    #[must_use]
    pub fn retryability(&self) -> Retryability {
        match self {
            Self::RegistryRead { .. }
            | Self::RegistryWrite { .. }
            | Self::VersionSlotConflict { .. }
            | Self::GovernanceUnavailable { .. } => Retryability::Retryable,
            Self::PartialDeployment { .. } => Retryability::AwaitingHuman,
            Self::InvalidContentIdentifier(_)
            | Self::VersionScanExhausted { .. }
            | Self::Authorization { .. }
            | Self::GovernanceRejected { .. }
            | Self::Storage { .. }
            | Self::Config(_)
            | Self::Plan(_)
            | Self::Cancelled { .. } => Retryability::Fatal,
        }
    }

    /// Actionable next step for the operator, printed alongside the error.
    #[must_use]
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::InvalidContentIdentifier(_) => {
                "re-run the upload; if the identifier persists, the storage node is misbehaving"
            }
            Self::RegistryRead { .. } | Self::RegistryWrite { .. } => {
                "check the registry endpoint and retry"
            }
            Self::VersionSlotConflict { .. } => "another deployment won the slot; re-run to take the next one",
            Self::VersionScanExhausted { .. } => {
                "the registry reports an implausible number of versions; verify the parent name"
            }
            Self::Authorization { .. } => {
                "use a credential belonging to an authorized approver of the governance account"
            }
            Self::GovernanceUnavailable { .. } => "check the governance endpoint and retry",
            Self::GovernanceRejected { .. } => {
                "inspect the proposal with `lockstone status`; a rejected publication needs a new version"
            }
            Self::PartialDeployment { .. } => "deploy a new version to retry",
            Self::Storage { .. } => "check the storage endpoint and the artifact directory",
            Self::Config(_) => "fix the configuration file or environment overrides",
            Self::Plan(_) => "this is a bug; nothing was written",
            Self::Cancelled { .. } => {
                "nothing further was written; any submitted proposal is still live and resumable"
            }
        }
    }
}
