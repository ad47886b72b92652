//! Threshold-approval governance backend client.
//!
//! Proposals are submitted over REST with the signer's bearer credential;
//! the backend counts submission as the signer's first approval. After
//! submission the backend owns the proposal - this client only ever holds
//! the identifier and queries or executes by it.
//!
//! # Idempotency
//!
//! The `Idempotency-Key` for a submission is derived from the sha2 digest of
//! the canonical operation encoding. Retrying a submission - in-process or
//! from a later invocation with identical operations - presents the same key,
//! so the backend returns the existing proposal instead of opening a second
//! competing one.
//!
//! # Error mapping
//!
//! - 401/403 -> [`DeployError::Authorization`] (fatal: the signer is not an
//!   authorized approver, or the credential is bad)
//! - transport, 408/429/5xx (after retry) -> `GovernanceUnavailable`
//! - other 4xx -> `GovernanceRejected` (the backend answered; retrying the
//!   same request cannot help)

use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use lockstone_types::{DeployError, ProposalId, ProposalOperation, ProposalStatus};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{Governance, read_capped_error_body};

pub struct GovernanceClient {
    http: reqwest::Client,
    endpoint: Url,
    signer_token: String,
    retry: RetryConfig,
}

/// Wire shape of a proposal snapshot.
#[derive(Debug, Deserialize)]
struct ProposalBody {
    id: String,
    approved: u32,
    required: u32,
    #[serde(default)]
    executed: bool,
}

impl From<ProposalBody> for ProposalStatus {
    fn from(body: ProposalBody) -> Self {
        Self {
            id: ProposalId::new(body.id),
            approved: body.approved,
            required: body.required,
            executed: body.executed,
        }
    }
}

/// Deterministic idempotency key for a set of operations.
///
/// Canonical encoding is the serde JSON of the ordered operation list; two
/// plans with the same writes in the same order share a key.
#[must_use]
pub fn proposal_idempotency_key(operations: &[ProposalOperation]) -> String {
    let canonical = serde_json::to_vec(operations).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    format!("lockstone-prop-{}", &hex::encode(digest)[..32])
}

impl GovernanceClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        signer_token: String,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            endpoint,
            signer_token,
            retry,
        }
    }

    fn url(&self, path: &str) -> Result<Url, DeployError> {
        self.endpoint
            .join(path)
            .map_err(|e| DeployError::Config(format!("governance endpoint: {e}")))
    }

    async fn classify_failure(outcome: RetryOutcome) -> DeployError {
        match outcome {
            RetryOutcome::Success(_) => unreachable!("classify_failure takes failed outcomes"),
            RetryOutcome::HttpError(response) => {
                let status = response.status();
                let body = read_capped_error_body(response).await;
                match status.as_u16() {
                    401 | 403 => DeployError::Authorization {
                        detail: if body.is_empty() {
                            format!("governance backend returned {status}")
                        } else {
                            body
                        },
                    },
                    code if code >= 500 || code == 408 || code == 429 => {
                        DeployError::GovernanceUnavailable {
                            source: format!("HTTP {status}: {body}").into(),
                        }
                    }
                    code => DeployError::GovernanceRejected {
                        status: code,
                        detail: body,
                    },
                }
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                DeployError::GovernanceUnavailable {
                    source: format!("failed after {attempts} attempts: {source}").into(),
                }
            }
            RetryOutcome::NonRetryable(e) => DeployError::GovernanceUnavailable {
                source: Box::new(e),
            },
        }
    }

    async fn decode(response: reqwest::Response) -> Result<ProposalStatus, DeployError> {
        let body: ProposalBody =
            response
                .json()
                .await
                .map_err(|e| DeployError::GovernanceUnavailable {
                    source: format!("malformed proposal body: {e}").into(),
                })?;
        Ok(body.into())
    }
}

impl Governance for GovernanceClient {
    async fn propose(
        &self,
        operations: &[ProposalOperation],
    ) -> Result<ProposalStatus, DeployError> {
        let url = self.url("v1/proposals")?;
        let key = proposal_idempotency_key(operations);
        let payload = serde_json::json!({ "operations": operations });

        let outcome = send_with_retry(
            || {
                self.http
                    .post(url.clone())
                    .bearer_auth(&self.signer_token)
                    .json(&payload)
            },
            Some(&key),
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(response) => {
                let status = Self::decode(response).await?;
                tracing::info!(
                    proposal = %status.id,
                    approved = status.approved,
                    required = status.required,
                    "proposal submitted"
                );
                Ok(status)
            }
            failed => Err(Self::classify_failure(failed).await),
        }
    }

    async fn status(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        let url = self.url(&format!("v1/proposals/{id}"))?;
        let outcome = send_with_retry(
            || self.http.get(url.clone()).bearer_auth(&self.signer_token),
            None,
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(response) => Self::decode(response).await,
            failed => Err(Self::classify_failure(failed).await),
        }
    }

    async fn execute(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        let url = self.url(&format!("v1/proposals/{id}/execute"))?;
        let outcome = send_with_retry(
            || self.http.post(url.clone()).bearer_auth(&self.signer_token),
            None,
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(response) => {
                let status = Self::decode(response).await?;
                tracing::info!(proposal = %status.id, "proposal executed");
                Ok(status)
            }
            failed => Err(Self::classify_failure(failed).await),
        }
    }
}
