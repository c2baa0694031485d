//! JSON-RPC 2.0 transport
//!
//! `RpcTransport` is the seam the ledger client talks through. The HTTP
//! implementation issues exactly one request per call; nothing here retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The request did not complete (connect, timeout, TLS, non-2xx)
    #[error("transport failure: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The node answered with something that is not a JSON-RPC response
    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// One JSON-RPC round trip
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method`; a `null` result is returned as `Value::Null`
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// JSON-RPC over HTTP(S)
#[derive(Debug)]
pub struct HttpRpcTransport {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpRpcTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(rpc_id = id, method, endpoint = %self.endpoint, "ledger rpc request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("Failed to reach ledger node: {e}")))?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "Ledger node returned HTTP {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("Failed to parse ledger response: {e}")))?;

        if let Some(error) = body.error {
            debug!(rpc_id = id, method, code = error.code, "ledger rpc error");
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for std::sync::Arc<T> {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).call(method, params).await
    }
}
