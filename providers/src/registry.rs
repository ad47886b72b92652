//! Naming registry JSON-RPC client.
//!
//! The registry speaks JSON-RPC 2.0 over HTTP. Reads are unauthenticated;
//! writes carry the signer credential and only make sense on the
//! individual-owns-parent path (governance-owned writes travel inside
//! proposals, not through this client).
//!
//! Error mapping at this boundary is deliberate and narrow:
//!
//! - transport/HTTP failures -> `RegistryRead`/`RegistryWrite` with the
//!   cause preserved (retried with backoff before surfacing);
//! - JSON-RPC error `-32040` ("node already exists") on create ->
//!   [`DeployError::VersionSlotConflict`], the signal a concurrent
//!   deployment won the slot;
//! - a `null` result on reads -> `Ok(None)`, which is an answer, never an
//!   error.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use lockstone_types::{
    Address, ContentPointer, DeployError, Fuses, NodeId, RegistryNode, TxId, VersionSlot,
};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{RegistryRead, RegistryWrite, read_capped_error_body};

/// JSON-RPC error code the registry returns when a create-child call races a
/// label that already exists.
const RPC_NODE_EXISTS: i64 = -32040;

pub struct RegistryClient {
    http: reqwest::Client,
    endpoint: Url,
    signer_token: Option<String>,
    retry: RetryConfig,
    next_id: AtomicU64,
}

#[derive(Debug, thiserror::Error)]
enum RpcError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("registry error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed registry response: {0}")]
    Decode(String),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(serde::Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Receipt for a registry write.
#[derive(Debug, serde::Deserialize)]
struct WriteReceipt {
    node: NodeId,
    tx: TxId,
}

impl RegistryClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        signer_token: Option<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            endpoint,
            signer_token,
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| RpcError::Decode(format!("request encoding: {e}")))?;

        let build = || {
            let mut req = self.http.post(self.endpoint.clone()).json(&body);
            if let Some(token) = &self.signer_token {
                req = req.bearer_auth(token);
            }
            req
        };

        let response = match send_with_retry(build, None, &self.retry).await {
            RetryOutcome::Success(resp) => resp,
            RetryOutcome::HttpError(resp) => {
                let status = resp.status().as_u16();
                let body = read_capped_error_body(resp).await;
                return Err(RpcError::Http { status, body });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(RpcError::Transport(format!(
                    "failed after {attempts} attempts: {source}"
                )));
            }
            RetryOutcome::NonRetryable(e) => {
                return Err(RpcError::Transport(e.to_string()));
            }
        };

        let payload: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = payload.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        match payload.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| RpcError::Decode(e.to_string())),
        }
    }

    async fn read<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, DeployError> {
        self.call(method, params)
            .await
            .map_err(|e| DeployError::RegistryRead {
                operation,
                source: Box::new(e),
            })
    }

    async fn write(
        &self,
        operation: &'static str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<WriteReceipt, DeployError> {
        let receipt: Option<WriteReceipt> = self.call(method, params).await.map_err(|e| {
            DeployError::RegistryWrite {
                operation,
                source: Box::new(e),
            }
        })?;
        receipt.ok_or_else(|| DeployError::RegistryWrite {
            operation,
            source: "registry returned no receipt".into(),
        })
    }
}

impl RegistryRead for RegistryClient {
    async fn get_owner(&self, node: NodeId) -> Result<Option<Address>, DeployError> {
        let owner: Option<Address> = self
            .read("getOwner", "registry_getOwner", json!([node]))
            .await?;
        // The registry reports unowned nodes as either null or the zero
        // account; normalize both to "free".
        Ok(owner.filter(|addr| !addr.is_zero()))
    }

    async fn get_data(&self, node: NodeId) -> Result<Option<RegistryNode>, DeployError> {
        self.read("getData", "registry_getData", json!([node])).await
    }

    async fn get_content_pointer(
        &self,
        node: NodeId,
    ) -> Result<Option<ContentPointer>, DeployError> {
        self.read(
            "getContentPointer",
            "registry_getContentPointer",
            json!([node]),
        )
        .await
    }
}

impl RegistryWrite for RegistryClient {
    async fn create_child(
        &self,
        parent: NodeId,
        label: &str,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<TxId, DeployError> {
        let params = json!([{
            "parent": parent,
            "label": label,
            "owner": owner,
            "fuses": fuses,
            "expiry": expiry,
        }]);
        let receipt = self
            .write("createChild", "registry_createChild", params)
            .await;
        match receipt {
            Ok(receipt) => {
                tracing::info!(node = %receipt.node, tx = %receipt.tx, label, "created child node");
                Ok(receipt.tx)
            }
            Err(DeployError::RegistryWrite { source, operation })
                if is_node_exists(source.as_ref()) =>
            {
                match label.parse::<VersionSlot>() {
                    Ok(slot) => Err(DeployError::VersionSlotConflict { slot }),
                    Err(_) => Err(DeployError::RegistryWrite {
                        operation,
                        source: format!("label {label:?} already exists").into(),
                    }),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn set_content_pointer(
        &self,
        node: NodeId,
        pointer: &ContentPointer,
    ) -> Result<TxId, DeployError> {
        let params = json!([{ "node": node, "pointer": pointer }]);
        let receipt = self
            .write("setContentPointer", "registry_setContentPointer", params)
            .await?;
        Ok(receipt.tx)
    }

    async fn set_fuses(&self, node: NodeId, fuses: Fuses) -> Result<TxId, DeployError> {
        let params = json!([{ "node": node, "fuses": fuses }]);
        let receipt = self.write("setFuses", "registry_setFuses", params).await?;
        Ok(receipt.tx)
    }
}

fn is_node_exists(source: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    source
        .downcast_ref::<RpcError>()
        .is_some_and(|e| matches!(e, RpcError::Rpc { code, .. } if *code == RPC_NODE_EXISTS))
}
