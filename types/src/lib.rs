//! Core domain types for Lockstone.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application: the content-pointer codec, the immutability fuse model, name
//! and account identifiers, the deployment plan value objects, and the error
//! taxonomy the rest of the workspace raises.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod contenthash;
mod error;
mod fuses;
mod name;
mod plan;

pub use contenthash::{ContentId, ContentIdError, ContentPointer, DecodedPointer, PointerKind};
pub use error::{BoxedCause, DeployError, Retryability};
pub use fuses::Fuses;
pub use name::{Address, AddressParseError, Name, NameParseError, NodeId};
pub use plan::{
    DeploymentMode, DeploymentOutcome, DeploymentPlan, DeploymentResult, NotAVersionLabel,
    PlanError, ProposalId, ProposalOperation, ProposalState, ProposalStatus, RegistryCall,
    RegistryNode, TxId, VersionSlot,
};

/// Expiry timestamp written into every published node: 2100-01-01T00:00:00Z.
///
/// Publication nodes never get a meaningful expiry window. The far-future
/// timestamp is paired with [`Fuses::CAN_EXTEND_EXPIRY`] so any party can
/// renew long before the node could lapse and become reclaimable.
pub const FAR_FUTURE_EXPIRY: u64 = 4_102_444_800;

/// Upper bound on the version-slot linear probe when no override is
/// configured. A registry that reports more occupied slots than this is
/// misbehaving or adversarial.
pub const DEFAULT_MAX_VERSION_SCAN: u32 = 200;
