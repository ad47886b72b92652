//! Deployment orchestration for Lockstone.
//!
//! # Architecture
//!
//! One deployment is a single sequential pipeline:
//!
//! ```text
//! upload -> resolve version -> detect mode -> build plan -> submit
//! ```
//!
//! - [`version`] - linear probe for the next free version slot
//! - [`ownership`] - who controls the parent name, selecting the mode
//! - [`planner`] - pure composition of the deployment plan
//! - [`driver`] - sequencing, cancellation, conflict retry, terminal result
//!
//! The crate is generic over the service seams defined in
//! `lockstone_providers`; protocol logic never sees a transport.

pub mod driver;
pub mod ownership;
pub mod planner;
pub mod version;

pub use driver::{CancelFlag, DeploySource, Driver};
pub use version::VersionScan;

#[cfg(test)]
pub(crate) mod testutil;
