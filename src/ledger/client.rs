//! Ledger node access: the `LedgerClient` capability and its JSON-RPC implementation.
//!
//! # Responsibilities
//! - Define exactly the node operations the engine consumes
//! - Send requests to the primary endpoint, falling over on transport failure
//! - Bound every request with the configured timeout
//! - Route signature subscriptions through a lazily (re)connected websocket

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use url::Url;

use crate::config::RpcConfig;
use crate::ledger::pubsub::PubsubClient;
use crate::ledger::types::{
    BlockhashReference, CommitmentLevel, LedgerError, LedgerResult, SendOptions,
    SignatureStatus, SignatureSubscription, SimulationResult, SubscriptionId, TxId,
};

/// Node operations consumed by the submission engine.
///
/// The handle is shared read-only across concurrent tasks.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Broadcast raw signed bytes; returns the id the node assigned.
    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> LedgerResult<TxId>;

    /// Register for a single notification once `id` reaches `commitment`.
    async fn subscribe_signature(
        &self,
        id: &TxId,
        commitment: CommitmentLevel,
    ) -> LedgerResult<SignatureSubscription>;

    async fn remove_signature_listener(&self, subscription: SubscriptionId) -> LedgerResult<()>;

    /// One entry per id, `None` when the node has not seen it.
    async fn get_signature_statuses(
        &self,
        ids: &[TxId],
    ) -> LedgerResult<Vec<Option<SignatureStatus>>>;

    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> LedgerResult<BlockhashReference>;

    /// Execute against current state without committing.
    async fn simulate_transaction(
        &self,
        raw: &[u8],
        commitment: CommitmentLevel,
    ) -> LedgerResult<SimulationResult>;
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

/// JSON-RPC ledger client with failover support.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    /// Primary endpoint first, then failovers.
    endpoints: Vec<Url>,
    ws_url: Url,
    timeout_duration: Duration,
    next_request_id: Arc<AtomicU64>,
    pubsub: Arc<Mutex<Option<Arc<PubsubClient>>>>,
}

impl RpcClient {
    /// Create a client from configuration. No connection is made until the first call.
    pub fn new(config: &RpcConfig) -> LedgerResult<Self> {
        let primary: Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let mut endpoints = vec![primary.clone()];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let ws_url = match &config.ws_url {
            Some(ws) => ws.parse().map_err(|e| {
                LedgerError::Rpc(format!("Invalid websocket URL '{}': {}", ws, e))
            })?,
            None => derive_ws_url(&primary)?,
        };

        tracing::info!(
            rpc_url = %primary,
            ws_url = %ws_url,
            failovers = endpoints.len() - 1,
            "Ledger client initialized"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoints,
            ws_url,
            timeout_duration: Duration::from_secs(config.request_timeout_secs),
            next_request_id: Arc::new(AtomicU64::new(1)),
            pubsub: Arc::new(Mutex::new(None)),
        })
    }

    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let attempt = async {
                self.http
                    .post(endpoint.clone())
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<RpcEnvelope<T>>()
                    .await
            };

            match timeout(self.timeout_duration, attempt).await {
                Ok(Ok(RpcEnvelope {
                    error: Some(err), ..
                })) => {
                    // A node-level answer is authoritative; another provider would say the same.
                    return Err(LedgerError::RpcResponse {
                        code: err.code,
                        message: err.message,
                    });
                }
                Ok(Ok(RpcEnvelope {
                    result: Some(result),
                    ..
                })) => return Ok(result),
                Ok(Ok(_)) => {
                    tracing::warn!(provider_idx = i, method, "Empty RPC response, trying next provider")
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider")
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider")
                }
            }
        }
        Err(LedgerError::Rpc(format!("All RPC providers failed for {}", method)))
    }

    async fn pubsub(&self) -> LedgerResult<Arc<PubsubClient>> {
        let mut slot = self.pubsub.lock().await;
        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            tracing::info!(ws_url = %self.ws_url, "Websocket closed, reconnecting");
        }

        let client = Arc::new(PubsubClient::connect(&self.ws_url, self.timeout_duration).await?);
        *slot = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl LedgerClient for RpcClient {
    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> LedgerResult<TxId> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    BASE64.encode(raw),
                    { "encoding": "base64", "skipPreflight": options.skip_preflight }
                ]),
            )
            .await?;
        signature.parse()
    }

    async fn subscribe_signature(
        &self,
        id: &TxId,
        commitment: CommitmentLevel,
    ) -> LedgerResult<SignatureSubscription> {
        self.pubsub()
            .await?
            .subscribe_signature(id, commitment, self.timeout_duration)
            .await
    }

    async fn remove_signature_listener(&self, subscription: SubscriptionId) -> LedgerResult<()> {
        let client = self.pubsub.lock().await.clone();
        match client {
            Some(client) => client.unsubscribe(subscription),
            None => Ok(()),
        }
    }

    async fn get_signature_statuses(
        &self,
        ids: &[TxId],
    ) -> LedgerResult<Vec<Option<SignatureStatus>>> {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call("getSignatureStatuses", json!([ids]))
            .await?;
        Ok(statuses.value)
    }

    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> LedgerResult<BlockhashReference> {
        let latest: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(BlockhashReference {
            blockhash: latest.value.blockhash.parse()?,
            last_valid_block_height: latest.value.last_valid_block_height,
        })
    }

    async fn simulate_transaction(
        &self,
        raw: &[u8],
        commitment: CommitmentLevel,
    ) -> LedgerResult<SimulationResult> {
        let result: WithContext<SimulationResult> = self
            .call(
                "simulateTransaction",
                json!([
                    BASE64.encode(raw),
                    { "encoding": "base64", "commitment": commitment.as_str() }
                ]),
            )
            .await?;
        Ok(result.value)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoints", &self.endpoints)
            .field("ws_url", &self.ws_url)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

/// Websocket endpoint convention: same host, ws scheme, HTTP port + 1 when explicit.
pub fn derive_ws_url(http: &Url) -> LedgerResult<Url> {
    let scheme = match http.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(LedgerError::Rpc(format!(
                "Cannot derive websocket URL from scheme '{}'",
                other
            )))
        }
    };

    let mut ws = http.clone();
    ws.set_scheme(scheme)
        .map_err(|_| LedgerError::Rpc(format!("Cannot derive websocket URL from {}", http)))?;
    if let Some(port) = http.port() {
        let next = port
            .checked_add(1)
            .ok_or_else(|| LedgerError::Rpc(format!("No websocket port above {}", port)))?;
        ws.set_port(Some(next))
            .map_err(|_| LedgerError::Rpc(format!("Cannot set websocket port on {}", http)))?;
    }
    Ok(ws)
}
