use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Narrow seam over a JSON-RPC endpoint: one method call, one `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        (**self).call(method, params).await
    }
}

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Vec<Value>,
    pub id: u64,
}

impl<'a> RpcRequest<'a> {
    // Requests are never pipelined, so a constant id is enough.
    pub fn new(method: &'a str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        }
    }
}

#[derive(Clone)]
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
}

impl HttpRpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let request = RpcRequest::new(method, params);
        let start_time = std::time::Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Transport(format!("HTTP error: {}", response.status())));
        }

        let body = response.bytes().await?;
        debug!("{} completed in {:?}", method, start_time.elapsed());

        let body: Value = serde_json::from_slice(&body)?;
        unwrap_response(body)
    }
}

/// Extracts `result` from a JSON-RPC response body, turning an `error`
/// object into [`IngestError::Rpc`].
pub fn unwrap_response(mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error["code"].as_i64().unwrap_or_default();
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(IngestError::Rpc { code, message });
    }

    if body.get("result").is_none() {
        return Err(IngestError::Decode(format!("response without result: {}", body)));
    }

    Ok(body["result"].take())
}
