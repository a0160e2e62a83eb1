//! Node JSON-RPC Client
//!
//! Talks JSON-RPC 2.0 over HTTP to one or more nodes with:
//! - Automatic failover to the next endpoint on errors
//! - Promotion of the last responsive endpoint to primary
//!
//! Used for the password check ([`AuthorizationBackend`]) and for
//! submitting finalized transactions.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::auth::{AuthDecision, AuthorizationBackend, PasswordHash};
use crate::draft::{FeeMode, FinalizedTransaction};
use crate::error::AuthError;

/// Timeout for RPC requests
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl<T> JsonRpcResponse<T> {
    fn into_result(self) -> Result<T> {
        if let Some(error) = self.error {
            return Err(anyhow!("RPC error {}: {}", error.code, error.message));
        }
        self.result
            .ok_or_else(|| anyhow!("Missing result in RPC response"))
    }
}

/// Connection to a single node endpoint
#[derive(Debug)]
struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
        };

        let start = Instant::now();
        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        let json_response: JsonRpcResponse<T> = response.json().await?;
        debug!(
            "{} {} answered in {}ms",
            self.url,
            method,
            start.elapsed().as_millis()
        );
        json_response.into_result()
    }
}

/// Node client with failover across configured endpoints
#[derive(Debug)]
pub struct NodeRpc {
    clients: Vec<RpcClient>,
    /// Index of the preferred endpoint
    primary: AtomicUsize,
}

impl NodeRpc {
    pub fn new(endpoints: &[String]) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(anyhow!("No RPC endpoints configured"));
        }
        let clients = endpoints
            .iter()
            .map(|url| RpcClient::new(url))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            clients,
            primary: AtomicUsize::new(0),
        })
    }

    /// Endpoint currently tried first
    pub fn primary_endpoint(&self) -> &str {
        &self.clients[self.primary.load(Ordering::SeqCst)].url
    }

    pub fn endpoint_count(&self) -> usize {
        self.clients.len()
    }

    /// Execute an RPC call with automatic failover
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let primary = self.primary.load(Ordering::SeqCst);

        for index in failover_order(primary, self.clients.len()) {
            let client = &self.clients[index];
            match client.call::<T>(method, params.clone()).await {
                Ok(result) => {
                    if index != primary {
                        debug!("Promoting {} to primary", client.url);
                        self.primary.store(index, Ordering::SeqCst);
                    }
                    return Ok(result);
                }
                Err(e) if index == primary => {
                    warn!("Primary node {} failed: {}", client.url, e);
                }
                Err(e) => {
                    debug!("Node {} failed: {}", client.url, e);
                }
            }
        }

        Err(anyhow!("All nodes failed"))
    }

    /// Ask the node whether `hash` matches the login password
    pub async fn is_authorized(&self, hash: &PasswordHash) -> Result<bool> {
        let result: AuthorizedResult = self
            .call("auth_isAuthorized", json!({ "password": hash.as_hex() }))
            .await?;
        Ok(result.authorized)
    }

    /// Submit a finalized send and return its transaction id
    pub async fn send_coins(&self, tx: &FinalizedTransaction) -> Result<String> {
        let result: SendCoinsResult = self
            .call("tx_sendCoins", send_coins_params(tx))
            .await?;
        Ok(result.txid)
    }
}

#[async_trait]
impl AuthorizationBackend for NodeRpc {
    async fn check_password(&self, hash: &PasswordHash) -> Result<AuthDecision, AuthError> {
        let authorized = self.is_authorized(hash).await?;
        Ok(if authorized {
            AuthDecision::Authorized
        } else {
            AuthDecision::Denied
        })
    }
}

/// Endpoint indices in the order they are tried: primary first, then the
/// rest in configured order
fn failover_order(primary: usize, len: usize) -> impl Iterator<Item = usize> {
    (0..len).map(move |offset| (primary + offset) % len)
}

fn send_coins_params(tx: &FinalizedTransaction) -> Value {
    let mut params = json!({
        "addr": tx.address,
        "amount": tx.amount,
        "sendAll": tx.send_all,
    });
    match tx.fee {
        FeeMode::TargetBlocks(blocks) => params["blocks"] = json!(blocks),
        FeeMode::FeeRate(rate) => params["fees"] = json!(rate),
    }
    params
}

#[derive(Debug, Deserialize)]
struct AuthorizedResult {
    authorized: bool,
}

#[derive(Debug, Deserialize)]
struct SendCoinsResult {
    txid: String,
}
