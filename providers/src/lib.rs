//! Service clients for the three external collaborators.
//!
//! # Architecture
//!
//! The crate is organized around one client per consumed service:
//!
//! - [`registry`] - naming registry JSON-RPC client (reads and writes)
//! - [`governance`] - threshold-approval backend REST client
//! - [`storage`] - content-addressed storage upload client
//!
//! Each client implements the corresponding seam trait ([`RegistryRead`],
//! [`RegistryWrite`], [`Governance`], [`ContentStore`]), which is what the
//! core orchestration consumes. The traits keep the core testable against
//! in-memory fakes and keep transport concerns out of the protocol logic.
//!
//! # Error Handling
//!
//! Transport and backend failures never escape raw: every client wraps them
//! into the [`DeployError`] taxonomy at this boundary, preserving the
//! underlying cause. Retryable conditions (timeouts, 408/429/5xx) are
//! retried here with bounded exponential backoff before the taxonomy ever
//! sees them; semantic failures (authorization, slot conflicts, rejections)
//! are never retried at this layer.

pub mod governance;
pub mod registry;
pub mod retry;
pub mod storage;

use std::path::Path;
use std::time::Duration;

use lockstone_types::{
    Address, ContentId, ContentPointer, DeployError, Fuses, NodeId, ProposalId,
    ProposalOperation, ProposalStatus, RegistryNode, TxId,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Build the hardened HTTP client every service client shares.
///
/// The per-request timeout is explicit and configuration-driven rather than
/// inherited silently from library defaults.
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .build()
}

/// Read an error body without letting a hostile server feed us gigabytes.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

// ── Service seams ────────────────────────────────────────────

/// Registry read interface: what version resolution and mode detection need.
pub trait RegistryRead {
    /// Current owner of a node, or `None` if the node does not exist.
    ///
    /// A transport failure is an error, never `None`: "unreachable" and
    /// "free" must stay distinguishable or version numbering corrupts.
    fn get_owner(
        &self,
        node: NodeId,
    ) -> impl Future<Output = Result<Option<Address>, DeployError>>;

    /// Full node record (owner, fuse mask, expiry).
    fn get_data(
        &self,
        node: NodeId,
    ) -> impl Future<Output = Result<Option<RegistryNode>, DeployError>>;

    /// Resolver-side content pointer bytes, if any are set.
    fn get_content_pointer(
        &self,
        node: NodeId,
    ) -> impl Future<Output = Result<Option<ContentPointer>, DeployError>>;
}

/// Registry write interface, used directly only on the
/// individual-owns-parent path; governance-owned writes travel inside
/// proposals instead.
pub trait RegistryWrite {
    /// Create `label` under `parent` with the given owner, fuse mask, and
    /// expiry. The registry's create is atomic: if the label exists this
    /// fails with a conflict, surfaced as
    /// [`DeployError::VersionSlotConflict`].
    fn create_child(
        &self,
        parent: NodeId,
        label: &str,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    ) -> impl Future<Output = Result<TxId, DeployError>>;

    fn set_content_pointer(
        &self,
        node: NodeId,
        pointer: &ContentPointer,
    ) -> impl Future<Output = Result<TxId, DeployError>>;

    fn set_fuses(
        &self,
        node: NodeId,
        fuses: Fuses,
    ) -> impl Future<Output = Result<TxId, DeployError>>;
}

/// Threshold-approval governance backend.
pub trait Governance {
    /// Submit operations as one proposal. Submission counts as the signer's
    /// own approval, so the returned status always has `approved >= 1`.
    /// Submitting identical operations twice returns the same proposal.
    fn propose(
        &self,
        operations: &[ProposalOperation],
    ) -> impl Future<Output = Result<ProposalStatus, DeployError>>;

    fn status(
        &self,
        id: &ProposalId,
    ) -> impl Future<Output = Result<ProposalStatus, DeployError>>;

    /// Execute a proposal whose threshold is met. Any party may call this.
    fn execute(
        &self,
        id: &ProposalId,
    ) -> impl Future<Output = Result<ProposalStatus, DeployError>>;
}

/// Content-addressed storage upload.
pub trait ContentStore {
    /// Upload a directory tree; returns the root content identifier and the
    /// total uploaded size in bytes.
    fn upload_dir(
        &self,
        dir: &Path,
    ) -> impl Future<Output = Result<(ContentId, u64), DeployError>>;
}
